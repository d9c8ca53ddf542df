//! Mutation log for speculative regions
//!
//! The first write to a variable cell or object field inside a region stores
//! the value it had before; later writes to the same location do not touch the
//! snapshot. Replaying the log restores the pre-region state, forgetting it
//! marks every touched location unknown.

use indexmap::IndexMap;
use tracing::trace;

use crate::ir::Symbol;
use crate::state::{CheapClone, Epoch, ObjectRef, State, Variable, VariableCell, object_identity};

#[derive(Debug, Clone)]
struct VariableSnapshot {
    symbol: Symbol,
    cell: VariableCell,
    old: State,
}

#[derive(Clone)]
struct FieldSnapshot {
    object: ObjectRef,
    field: Symbol,
    /// `None` when the field did not exist before the region
    old: Option<State>,
}

#[derive(Clone, Default)]
pub struct HistoryLog {
    variables: IndexMap<usize, VariableSnapshot>,
    fields: IndexMap<(usize, Symbol), FieldSnapshot>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len() + self.fields.len()
    }

    /// Snapshot a variable before it is written. Only the first call per cell counts.
    pub fn record_variable(&mut self, variable: &Variable) {
        self.variables
            .entry(variable.cell().address())
            .or_insert_with(|| VariableSnapshot {
                symbol: variable.symbol,
                cell: variable.cell().cheap_clone(),
                old: variable.state(),
            });
    }

    /// Snapshot a field before it is written. Only the first call per location counts.
    pub fn record_field(&mut self, object: &ObjectRef, field: Symbol) {
        self.fields
            .entry((object_identity(object), field))
            .or_insert_with(|| FieldSnapshot {
                object: object.cheap_clone(),
                field,
                old: object.field(field),
            });
    }

    /// Absorb an inner region's log; snapshots already held here win.
    pub fn merge(&mut self, inner: HistoryLog) {
        for (key, snapshot) in inner.variables {
            self.variables.entry(key).or_insert(snapshot);
        }
        for (key, snapshot) in inner.fields {
            self.fields.entry(key).or_insert(snapshot);
        }
    }

    /// Restore every recorded location to its pre-region value.
    pub fn rollback(&self) {
        for snapshot in self.variables.values() {
            trace!(symbol = %snapshot.symbol, "restore variable");
            snapshot.cell.set(snapshot.old.cheap_clone());
        }
        for snapshot in self.fields.values() {
            match &snapshot.old {
                Some(old) => {
                    snapshot.object.set_field(snapshot.field, old.cheap_clone());
                }
                None => {
                    snapshot.object.remove_field(snapshot.field);
                }
            }
        }
    }

    /// Mark every recorded location unknown.
    pub fn forget(&self) {
        for snapshot in self.variables.values() {
            trace!(symbol = %snapshot.symbol, "forget variable");
            snapshot.cell.set(State::Unknown);
        }
        for snapshot in self.fields.values() {
            snapshot.object.set_field(snapshot.field, State::Unknown);
        }
    }

    /// Whether any recorded location existed before `epoch`
    pub fn touches_older_than(&self, epoch: Epoch) -> bool {
        self.variables.values().any(|s| s.cell.epoch() < epoch)
            || self.fields.values().any(|s| s.object.epoch() < epoch)
    }
}
