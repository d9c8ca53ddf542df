//! Call stack of the folding machine
//!
//! A stack of [`Frame`]s, one per function activation, each holding a path of
//! [`SubFrame`]s for the lexical regions entered inside it. Sub-frames own the
//! instruction queue, the data stack and the variables of their region.
//!
//! Three unwinders implement non-local control flow (`return`, `break` and
//! `continue`, `throw`). None of them ever crosses the innermost
//! [`CallStack::safe_execute`] boundary: each first searches for its target
//! above the boundary and fails without touching the stack when there is none.
//! `finally` blocks on the way are run by queueing a detour in the parent of
//! the `try` region: the finally block, a discard of its value, and the
//! instruction that resumes the jump.

pub mod frame;
pub mod history;
pub mod instruction;
pub mod sub_frame;

pub use frame::Frame;
pub use history::HistoryLog;
pub use instruction::Instruction;
pub use sub_frame::{SubFrame, SubFrameArena, SubFrameId};

use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::{trace, warn};

use crate::error::FoldError;
use crate::ir::{Ir, NodeId, NodeKind, Symbol, Try};
use crate::state::{ClosureRef, Epoch, ObjectRef, State, Variable, object_identity};

/// Position on the stack: number of frames and sub-frames of the top frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depth {
    pub frames: usize,
    pub sub_frames: usize,
}

/// How a history scope ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExit {
    /// Restore every location written inside the scope
    Rollback,
    /// Mark every location written inside the scope unknown
    Forget,
    /// Keep the writes; the log moves to the enclosing scope
    Keep,
}

/// Token returned by [`CallStack::open_history_scope`]
#[must_use]
#[derive(Debug)]
pub struct HistoryScope {
    depth: Depth,
    collect_all_changes: bool,
}

#[derive(Default)]
pub struct CallStack {
    frames: Vec<Frame>,
    arena: SubFrameArena,
    /// New sub-frames log their writes while set
    collect_all_changes: bool,
    boundaries: Vec<Depth>,
}

impl AsMut<CallStack> for CallStack {
    fn as_mut(&mut self) -> &mut CallStack {
        self
    }
}

fn no_frame() -> FoldError {
    FoldError::internal_error("call stack has no active frame")
}

fn no_sub_frame() -> FoldError {
    FoldError::internal_error("frame has no active sub-frame")
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Frames and sub-frames
    // ═══════════════════════════════════════════════════════════════════════

    pub fn depth(&self) -> Depth {
        Depth {
            frames: self.frames.len(),
            sub_frames: self.frames.last().map_or(0, Frame::len),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sub-frames currently alive across all frames
    pub fn live_sub_frames(&self) -> usize {
        self.arena.live_count()
    }

    pub fn is_collecting_changes(&self) -> bool {
        self.collect_all_changes
    }

    fn frame(&self) -> Result<&Frame, FoldError> {
        self.frames.last().ok_or_else(no_frame)
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, FoldError> {
        self.frames.last_mut().ok_or_else(no_frame)
    }

    pub fn current_sub_frame(&self) -> Result<&SubFrame, FoldError> {
        let id = self.frame()?.current().ok_or_else(no_sub_frame)?;
        self.arena.get(id).ok_or_else(no_sub_frame)
    }

    pub fn current_sub_frame_mut(&mut self) -> Result<&mut SubFrame, FoldError> {
        let id = self.frame()?.current().ok_or_else(no_sub_frame)?;
        self.arena.get_mut(id).ok_or_else(no_sub_frame)
    }

    /// Owner of the innermost sub-frame of the top frame
    pub fn current_frame_owner(&self) -> Option<NodeId> {
        self.current_sub_frame().ok().map(SubFrame::owner)
    }

    fn make_sub_frame(&self, owner: NodeId) -> SubFrame {
        if self.collect_all_changes {
            SubFrame::with_history(owner)
        } else {
            SubFrame::new(owner)
        }
    }

    pub fn new_frame(&mut self, owner: NodeId) {
        let base = self.arena.alloc(self.make_sub_frame(owner));
        self.frames.push(Frame::new(owner, base));
    }

    /// Pop the top frame and all its sub-frames without propagating any state.
    ///
    /// Writes logged inside the frame are merged into the caller's current
    /// sub-frame when it logs too.
    pub fn drop_frame(&mut self) -> Result<(), FoldError> {
        let mut frame = self.frames.pop().ok_or_else(no_frame)?;
        let mut merged: Option<HistoryLog> = None;
        while let Some(id) = frame.pop() {
            let Some(mut sub_frame) = self.arena.release(id) else {
                continue;
            };
            if let Some(mut outer) = sub_frame.take_history() {
                if let Some(inner) = merged.take() {
                    outer.merge(inner);
                }
                merged = Some(outer);
            }
        }
        if let Some(log) = merged {
            self.absorb_history(log);
        }
        Ok(())
    }

    fn absorb_history(&mut self, log: HistoryLog) {
        if let Ok(sub_frame) = self.current_sub_frame_mut()
            && let Some(history) = sub_frame.history_mut()
        {
            history.merge(log);
        }
    }

    pub fn new_sub_frame(&mut self, owner: NodeId) -> Result<(), FoldError> {
        let sub_frame = self.make_sub_frame(owner);
        let frame = self.frames.last_mut().ok_or_else(no_frame)?;
        let id = self.arena.alloc(sub_frame);
        frame.push(id);
        Ok(())
    }

    /// Pop the innermost sub-frame, moving its top state to the parent.
    ///
    /// When the frame has no sub-frame left the state is dropped.
    pub fn drop_sub_frame(&mut self) -> Result<(), FoldError> {
        self.remove_sub_frame(true)
    }

    pub fn drop_sub_frame_without_propagation(&mut self) -> Result<(), FoldError> {
        self.remove_sub_frame(false)
    }

    fn remove_sub_frame(&mut self, propagate: bool) -> Result<(), FoldError> {
        let frame = self.frames.last_mut().ok_or_else(no_frame)?;
        let id = frame.pop().ok_or_else(no_sub_frame)?;
        let mut sub_frame = self.arena.release(id).ok_or_else(no_sub_frame)?;
        let Some(parent) = frame.current().and_then(|p| self.arena.get_mut(p)) else {
            return Ok(());
        };
        if let Some(log) = sub_frame.take_history()
            && let Some(history) = parent.history_mut()
        {
            history.merge(log);
        }
        if propagate && let Some(state) = sub_frame.pop_state() {
            parent.push_state(state);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Instructions and data
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_instruction(&mut self, instruction: Instruction) -> Result<(), FoldError> {
        self.current_sub_frame_mut()?.push_instruction(instruction);
        Ok(())
    }

    /// Next instruction of the innermost sub-frame, if its queue is not empty.
    pub fn pop_instruction(&mut self) -> Option<Instruction> {
        let frame = self.frames.last_mut()?;
        let instruction = self.arena.get_mut(frame.current()?)?.pop_instruction()?;
        frame.set_current_instruction(instruction);
        Some(instruction)
    }

    pub fn push_state(&mut self, state: State) -> Result<(), FoldError> {
        self.current_sub_frame_mut()?.push_state(state);
        Ok(())
    }

    pub fn pop_state(&mut self) -> Result<State, FoldError> {
        self.current_sub_frame_mut()?
            .pop_state()
            .ok_or(FoldError::StackUnderflow)
    }

    pub fn peek_state(&self) -> Option<&State> {
        self.current_sub_frame().ok()?.peek_state()
    }

    pub fn data_height(&self) -> usize {
        self.current_sub_frame().map_or(0, SubFrame::data_height)
    }

    /// Pop the top state if the data stack grew past `mark`, then cut it back to `mark`.
    pub fn pop_state_above(&mut self, mark: usize) -> Option<State> {
        let sub_frame = self.current_sub_frame_mut().ok()?;
        if sub_frame.data_height() <= mark {
            return None;
        }
        let top = sub_frame.pop_state();
        sub_frame.truncate_data(mark);
        top
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables and fields
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), FoldError> {
        self.current_sub_frame_mut()?.add_variable(variable);
        Ok(())
    }

    pub fn contains_variable(&self, symbol: Symbol) -> bool {
        self.frames
            .last()
            .is_some_and(|f| f.find_variable(&self.arena, symbol).is_some())
    }

    /// Every variable visible in the current frame, outermost first
    pub fn frame_variables(&self) -> Vec<Variable> {
        self.frames
            .last()
            .map(|f| f.variables(&self.arena))
            .unwrap_or_default()
    }

    /// Bound value of `symbol` in the current frame
    pub fn get_state(&self, symbol: Symbol) -> Result<State, FoldError> {
        self.frame()?
            .load_state(&self.arena, symbol)
            .ok_or_else(|| FoldError::symbol_not_found(symbol.to_string()))
    }

    pub fn set_state(&mut self, symbol: Symbol, state: State) -> Result<(), FoldError> {
        let variable = self
            .frame()?
            .find_variable(&self.arena, symbol)
            .cloned()
            .ok_or_else(|| FoldError::symbol_not_found(symbol.to_string()))?;
        self.record_variable(&variable);
        variable.set(state);
        Ok(())
    }

    /// Mark a variable unknown. Returns whether the current frame declares it.
    pub fn drop_state(&mut self, symbol: Symbol) -> bool {
        let Some(variable) = self
            .frames
            .last()
            .and_then(|f| f.find_variable(&self.arena, symbol))
            .cloned()
        else {
            return false;
        };
        self.record_variable(&variable);
        variable.set(State::Unknown);
        true
    }

    fn receiver_object(&self, receiver: Symbol) -> Result<ObjectRef, FoldError> {
        match self.get_state(receiver)? {
            State::Object(object) => Ok(object),
            _ => Err(FoldError::not_an_object(receiver.to_string())),
        }
    }

    pub fn get_field(&self, receiver: Symbol, field: Symbol) -> Result<State, FoldError> {
        self.receiver_object(receiver)?
            .field(field)
            .filter(|state| !state.is_unknown())
            .ok_or_else(|| FoldError::field_not_found(field.to_string()))
    }

    pub fn set_field_for_receiver(
        &mut self,
        receiver: Symbol,
        field: Symbol,
        state: State,
    ) -> Result<(), FoldError> {
        let object = self.receiver_object(receiver)?;
        self.record_field(&object, field);
        object.set_field(field, state);
        Ok(())
    }

    /// Mark `field` unknown on every object reachable from a live variable.
    ///
    /// A write through a receiver whose object is not known may land on any
    /// of them.
    pub fn forget_field_everywhere(&mut self, field: Symbol) {
        let mut pending: Vec<State> = self
            .frames
            .iter()
            .flat_map(|f| f.variables(&self.arena))
            .map(|v| v.state())
            .collect();
        let mut seen = FxHashSet::default();
        let mut objects = Vec::new();
        while let Some(state) = pending.pop() {
            match state {
                State::Object(object) => {
                    if seen.insert(object_identity(&object)) {
                        pending.extend(object.field_values());
                        objects.push(object);
                    }
                }
                State::Closure(closure) => {
                    if seen.insert(Rc::as_ptr(&closure) as *const () as usize) {
                        pending.extend(closure.up_values().iter().map(Variable::state));
                    }
                }
                State::Array(elements) => pending.extend(elements.iter().cloned()),
                State::Unknown | State::Primitive(_) => {}
            }
        }
        for object in objects {
            if object.field(field).is_some_and(|state| !state.is_unknown()) {
                trace!(%field, "field may be written through an unknown receiver");
                self.record_field(&object, field);
                object.set_field(field, State::Unknown);
            }
        }
    }

    fn history_holder(&mut self) -> Option<&mut HistoryLog> {
        let holder = self.frames.last()?.history_holder(&self.arena)?;
        self.arena.get_mut(holder)?.history_mut()
    }

    fn record_variable(&mut self, variable: &Variable) {
        if let Some(log) = self.history_holder() {
            log.record_variable(variable);
        }
    }

    fn record_field(&mut self, object: &ObjectRef, field: Symbol) {
        if let Some(log) = self.history_holder() {
            log.record_field(object, field);
        }
    }

    /// Capture every variable of the current frame into a closure.
    pub fn store_up_values(&self, closure: &ClosureRef) -> Result<(), FoldError> {
        for variable in self.frame()?.variables(&self.arena) {
            closure.capture(variable);
        }
        Ok(())
    }

    /// Make a closure's captured variables visible in the current sub-frame.
    pub fn load_up_values(&mut self, closure: &ClosureRef) -> Result<(), FoldError> {
        let sub_frame = self.current_sub_frame_mut()?;
        for variable in closure.up_values() {
            sub_frame.add_variable(variable);
        }
        Ok(())
    }

    pub fn stack_trace(&self, ir: &Ir) -> Vec<String> {
        self.frames.iter().rev().map(|f| f.describe(ir)).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Boundaries and history scopes
    // ═══════════════════════════════════════════════════════════════════════

    /// Run `block`; if it fails, unwind the stack to where it was on entry.
    pub fn safe_execute<T, R>(
        owner: &mut T,
        block: impl FnOnce(&mut T) -> Result<R, FoldError>,
    ) -> Result<R, FoldError>
    where
        T: AsMut<CallStack>,
    {
        let depth = owner.as_mut().depth();
        owner.as_mut().boundaries.push(depth);
        let result = block(owner);
        let stack = owner.as_mut();
        stack.boundaries.pop();
        if result.is_err() {
            stack.unwind_to(depth);
        }
        result
    }

    fn unwind_to(&mut self, depth: Depth) {
        while self.frames.len() > depth.frames {
            if self.drop_frame().is_err() {
                break;
            }
        }
        while self.frames.len() == depth.frames
            && self.frames.last().map_or(0, Frame::len) > depth.sub_frames
        {
            if self.drop_sub_frame_without_propagation().is_err() {
                break;
            }
        }
        if self.depth() != depth {
            warn!(expected = ?depth, actual = ?self.depth(), "unwound below the recorded depth");
        }
    }

    /// Enter a region whose writes are logged until [`CallStack::close_history_scope`].
    pub fn open_history_scope(&mut self) -> Result<HistoryScope, FoldError> {
        let owner = self.current_frame_owner().ok_or_else(no_sub_frame)?;
        let scope = HistoryScope {
            depth: self.depth(),
            collect_all_changes: self.collect_all_changes,
        };
        let id = self.arena.alloc(SubFrame::with_history(owner));
        self.frame_mut()?.push(id);
        self.collect_all_changes = true;
        Ok(scope)
    }

    pub fn close_history_scope(&mut self, scope: HistoryScope, exit: ScopeExit) {
        self.unwind_to(Depth {
            frames: scope.depth.frames,
            sub_frames: scope.depth.sub_frames + 1,
        });
        if let Ok(sub_frame) = self.current_sub_frame()
            && let Some(log) = sub_frame.history()
        {
            trace!(?exit, writes = log.len(), "close history scope");
            match exit {
                ScopeExit::Rollback => log.rollback(),
                ScopeExit::Forget => log.forget(),
                ScopeExit::Keep => {}
            }
        }
        if let Err(error) = self.drop_sub_frame_without_propagation() {
            warn!(%error, "history scope lost its sub-frame");
        }
        self.collect_all_changes = scope.collect_all_changes;
    }

    /// Whether the innermost scope wrote to a location created before `epoch`
    pub fn scope_touches_older_than(&self, epoch: Epoch) -> bool {
        self.current_sub_frame()
            .ok()
            .and_then(SubFrame::history)
            .is_some_and(|log| log.touches_older_than(epoch))
    }

    /// Run `block` and undo its writes if it returns true.
    pub fn rollback_all_changes<T>(owner: &mut T, block: impl FnOnce(&mut T) -> bool) -> bool
    where
        T: AsMut<CallStack>,
    {
        Self::scoped(owner, ScopeExit::Rollback, block)
    }

    /// Run `block` and mark everything it wrote unknown if it returns true.
    pub fn remove_all_mutated_variables_and_fields<T>(
        owner: &mut T,
        block: impl FnOnce(&mut T) -> bool,
    ) -> bool
    where
        T: AsMut<CallStack>,
    {
        Self::scoped(owner, ScopeExit::Forget, block)
    }

    fn scoped<T>(owner: &mut T, exit: ScopeExit, block: impl FnOnce(&mut T) -> bool) -> bool
    where
        T: AsMut<CallStack>,
    {
        let scope = match owner.as_mut().open_history_scope() {
            Ok(scope) => scope,
            Err(error) => {
                warn!(%error, "cannot open history scope");
                return false;
            }
        };
        let apply = block(owner);
        let exit = if apply { exit } else { ScopeExit::Keep };
        owner.as_mut().close_history_scope(scope, exit);
        apply
    }

    /// Run `block`, undoing its writes if it fails.
    pub fn with_rollback_on_failure<T, R>(
        owner: &mut T,
        block: impl FnOnce(&mut T) -> Result<R, FoldError>,
    ) -> Result<R, FoldError>
    where
        T: AsMut<CallStack>,
    {
        let scope = owner.as_mut().open_history_scope()?;
        let result = block(owner);
        let exit = if result.is_ok() {
            ScopeExit::Keep
        } else {
            ScopeExit::Rollback
        };
        owner.as_mut().close_history_scope(scope, exit);
        result
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Unwinding
    // ═══════════════════════════════════════════════════════════════════════

    fn boundary(&self) -> Depth {
        self.boundaries.last().copied().unwrap_or(Depth {
            frames: 0,
            sub_frames: 0,
        })
    }

    /// Owners of the sub-frames above the innermost boundary, innermost first,
    /// paired with the index of their frame.
    fn regions_above_boundary(&self) -> Vec<(usize, NodeId)> {
        let boundary = self.boundary();
        let mut regions = Vec::new();
        for (index, frame) in self.frames.iter().enumerate().rev() {
            if index + 1 < boundary.frames {
                break;
            }
            let skip = if index + 1 == boundary.frames {
                boundary.sub_frames
            } else {
                0
            };
            regions.extend(
                frame
                    .path()
                    .iter()
                    .skip(skip)
                    .rev()
                    .filter_map(|id| self.arena.get(*id))
                    .map(|s| (index, s.owner())),
            );
        }
        regions
    }

    fn queue_finally(&mut self, finally: NodeId, resume: Instruction) -> Result<(), FoldError> {
        self.add_instruction(resume)?;
        self.add_instruction(Instruction::Discard)?;
        self.add_instruction(Instruction::Compound(finally))
    }

    /// Drop a region the unwinder walks out of, and the frame if it was its last one.
    fn leave_region(&mut self) -> Result<(), FoldError> {
        self.drop_sub_frame_without_propagation()?;
        if self.frame()?.has_no_sub_frames() {
            self.drop_frame()?;
        }
        Ok(())
    }

    /// Unwind to the target of a `Return`, whose value is on the data stack.
    ///
    /// A `try` with a `finally` on the way interrupts the walk: the finally
    /// block runs first, then the return is executed again.
    pub fn return_from_frame_with_result(&mut self, ir: &Ir, node: NodeId) -> Result<(), FoldError> {
        let target = match ir.kind(node) {
            Some(NodeKind::Return { target, .. }) => *target,
            _ => return Err(FoldError::internal_error(format!("{} is not a return", node))),
        };
        if !self
            .regions_above_boundary()
            .iter()
            .any(|(_, owner)| *owner == target)
        {
            return Err(FoldError::target_not_found(ir.describe(target)));
        }
        let result = self.pop_state()?;

        loop {
            let owner = self.current_frame_owner().ok_or_else(no_sub_frame)?;
            if owner == target {
                break;
            }
            trace!(region = %ir.describe(owner), "return leaves region");
            if let Some(NodeKind::Try(Try {
                finally: Some(finally),
                ..
            })) = ir.kind(owner)
            {
                let finally = *finally;
                self.drop_sub_frame_without_propagation()?;
                self.push_state(result)?;
                return self.queue_finally(finally, Instruction::Simple(node));
            }
            self.leave_region()?;
        }

        let constructor = ir.function(target).is_some_and(|f| f.is_constructor());
        let sub_frame = self.current_sub_frame_mut()?;
        sub_frame.clear_instructions();
        sub_frame.truncate_data(0);
        sub_frame.push_instruction(Instruction::Simple(target));
        if !constructor {
            sub_frame.push_state(result);
        }
        Ok(())
    }

    /// Unwind to the loop targeted by a `Break` or `Continue`.
    pub fn unroll_instructions_for_break_continue(
        &mut self,
        ir: &Ir,
        node: NodeId,
    ) -> Result<(), FoldError> {
        let (target, is_break) = match ir.kind(node) {
            Some(NodeKind::Break { target }) => (*target, true),
            Some(NodeKind::Continue { target }) => (*target, false),
            _ => return Err(FoldError::internal_error(format!("{} is not a jump", node))),
        };
        let condition = match ir.kind(target) {
            Some(NodeKind::While { condition, .. } | NodeKind::DoWhile { condition, .. }) => *condition,
            _ => return Err(FoldError::target_not_found(ir.describe(target))),
        };
        let top = self.frames.len().saturating_sub(1);
        if !self
            .regions_above_boundary()
            .iter()
            .any(|(frame, owner)| *frame == top && *owner == target)
        {
            return Err(FoldError::target_not_found(ir.describe(target)));
        }

        loop {
            let owner = self.current_frame_owner().ok_or_else(no_sub_frame)?;
            if owner == target {
                break;
            }
            trace!(region = %ir.describe(owner), "jump leaves region");
            if let Some(NodeKind::Try(Try {
                finally: Some(finally),
                ..
            })) = ir.kind(owner)
            {
                let finally = *finally;
                self.drop_sub_frame_without_propagation()?;
                return self.queue_finally(finally, Instruction::Simple(node));
            }
            self.drop_sub_frame_without_propagation()?;
        }

        if is_break {
            self.drop_sub_frame_without_propagation()?;
            self.push_state(State::unit())
        } else {
            let sub_frame = self.current_sub_frame_mut()?;
            sub_frame.clear_instructions();
            sub_frame.truncate_data(0);
            sub_frame.push_instruction(Instruction::Simple(target));
            sub_frame.push_instruction(Instruction::Compound(condition));
            Ok(())
        }
    }

    /// Unwind to the nearest `try` region able to handle the thrown value on
    /// top of the data stack.
    ///
    /// A region with catch clauses is reset and gets one `Catch` instruction
    /// per clause; a region with only a `finally` runs it and keeps unwinding.
    /// Regions whose catch clause is currently running only count for their
    /// `finally`.
    pub fn drop_frames_until_try_catch(&mut self, ir: &Ir) -> Result<(), FoldError> {
        let mut skip_catches = false;
        let handled = self.regions_above_boundary().iter().any(|(_, owner)| match ir.kind(*owner) {
            Some(NodeKind::Catch(_)) => {
                skip_catches = true;
                false
            }
            Some(NodeKind::Try(t)) => {
                let handles = handles_throw(t, skip_catches);
                skip_catches = false;
                handles
            }
            _ => false,
        });
        let thrown = self.pop_state()?;
        if !handled {
            return Err(FoldError::UncaughtThrow {
                value: thrown,
                stack_trace: self.stack_trace(ir),
            });
        }

        let mut skip_catches = false;
        loop {
            let owner = self.current_frame_owner().ok_or_else(no_sub_frame)?;
            match ir.kind(owner) {
                Some(NodeKind::Catch(_)) => {
                    skip_catches = true;
                    self.drop_sub_frame_without_propagation()?;
                }
                Some(NodeKind::Try(t)) if !skip_catches && !t.catches.is_empty() => {
                    trace!(region = %ir.describe(owner), "throw enters catch clauses");
                    let catches = t.catches.clone();
                    self.drop_sub_frame_without_propagation()?;
                    self.new_sub_frame(owner)?;
                    self.push_state(thrown)?;
                    self.add_instruction(Instruction::Simple(owner))?;
                    self.add_instruction(Instruction::Rethrow(owner))?;
                    for catch in catches.iter().rev() {
                        self.add_instruction(Instruction::Catch(*catch))?;
                    }
                    return Ok(());
                }
                Some(NodeKind::Try(t)) => {
                    let finally = t.finally;
                    self.drop_sub_frame_without_propagation()?;
                    if let Some(finally) = finally {
                        trace!(region = %ir.describe(owner), "throw runs finally");
                        self.push_state(thrown)?;
                        return self.queue_finally(finally, Instruction::PropagateThrow);
                    }
                    skip_catches = false;
                }
                _ => self.leave_region()?,
            }
        }
    }
}

fn handles_throw(region: &Try, skip_catches: bool) -> bool {
    (!skip_catches && !region.catches.is_empty()) || region.finally.is_some()
}
