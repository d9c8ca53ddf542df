//! Syntactic side-effect scan

use rustc_hash::FxHashSet;

use crate::declarations::Declarations;
use crate::ir::{Ir, NodeId, NodeKind, Symbol};

/// Locations a subtree may write when it runs
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub variables: FxHashSet<Symbol>,
    pub fields: Vec<(Symbol, Symbol)>,
    /// Contains a call that may write through object references
    pub opaque_calls: bool,
}

impl Effects {
    /// Everything `root` may write, including lambda bodies it contains.
    pub fn of(ir: &Ir, declarations: &Declarations, root: NodeId) -> Effects {
        let mut effects = Effects::default();
        let mut pending = vec![root];
        let mut seen = FxHashSet::default();
        while let Some(node) = pending.pop() {
            if !seen.insert(node) {
                continue;
            }
            let Some(kind) = ir.kind(node) else {
                continue;
            };
            match kind {
                NodeKind::SetValue { symbol, .. } => {
                    effects.variables.insert(*symbol);
                }
                NodeKind::SetField {
                    receiver, field, ..
                } => {
                    if !effects.fields.contains(&(*receiver, *field)) {
                        effects.fields.push((*receiver, *field));
                    }
                }
                NodeKind::Call(call) if declarations.intrinsic(call.callee).is_none() => {
                    effects.opaque_calls = true;
                }
                NodeKind::ConstructorCall(_) | NodeKind::Invoke { .. } => {
                    effects.opaque_calls = true;
                }
                _ => {}
            }
            pending.extend(kind.children());
        }
        effects
    }
}
