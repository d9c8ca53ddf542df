//! Partial evaluator
//!
//! Walks an expression tree with some values unknown, folding what it can on
//! the machine and rewriting the tree in place. Every node kind has an `eval_*`
//! step that computes what is known about its operands and a `fallback_*` step
//! that writes the (possibly simplified) node back and leaves its value, if
//! known, on the current data stack.
//!
//! Code whose effects cannot be determined is still visited, inside history
//! scopes that roll back what it did or mark it unknown, so that no later fold
//! relies on a value such code might have changed.

pub(crate) mod scan;

use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

use crate::environment::Environment;
use crate::error::FoldError;
use crate::ir::{Branch, Call, Catch, Function, Ir, NodeId, NodeKind, Symbol};
use crate::stack::{CallStack, Instruction};
use crate::state::{Epoch, State, Variable};

use scan::Effects;

/// Result of a successful fold attempt
struct Evaluated {
    state: State,
    /// Nothing that existed before the attempt was written
    pure: bool,
}

pub struct Evaluator<'e, 'a> {
    env: &'e mut Environment<'a>,
    ir: &'e mut Ir,
    /// Variables a lambda may write at any time; never folded again
    escaped: FxHashSet<Symbol>,
}

impl AsMut<CallStack> for Evaluator<'_, '_> {
    fn as_mut(&mut self) -> &mut CallStack {
        self.env.call_stack_mut()
    }
}

impl<'e, 'a> Evaluator<'e, 'a> {
    pub fn new(env: &'e mut Environment<'a>, ir: &'e mut Ir) -> Self {
        Evaluator {
            env,
            ir,
            escaped: FxHashSet::default(),
        }
    }

    fn stack(&mut self) -> &mut CallStack {
        self.env.call_stack_mut()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entry points
    // ═══════════════════════════════════════════════════════════════════════

    /// Run `node` on the machine in a fresh sub-frame.
    ///
    /// `args` are pushed in call order before the node runs; with
    /// `interpret_only` the node itself consumes them as its operands. Any
    /// failure leaves the stack and every variable and field as they were.
    pub fn evaluate(&mut self, node: NodeId, args: Vec<State>, interpret_only: bool) -> Option<State> {
        self.evaluate_tracked(node, args, interpret_only)
            .map(|evaluated| evaluated.state)
    }

    fn evaluate_tracked(
        &mut self,
        node: NodeId,
        args: Vec<State>,
        interpret_only: bool,
    ) -> Option<Evaluated> {
        let epoch = Epoch::now();
        let outcome = CallStack::with_rollback_on_failure(self, |ev| {
            let state = ev.run_in_sub_frame(node, args, interpret_only)?;
            let pure = !ev.stack().scope_touches_older_than(epoch);
            Ok(Evaluated { state, pure })
        });
        match outcome {
            Ok(evaluated) if !evaluated.state.is_unknown() => Some(evaluated),
            Ok(_) => None,
            Err(error) if error.is_resource_limit() => {
                warn!(node = %self.ir.describe(node), %error, "fold attempt abandoned");
                None
            }
            Err(error) => {
                debug!(node = %self.ir.describe(node), %error, "fold attempt failed");
                None
            }
        }
    }

    fn run_in_sub_frame(
        &mut self,
        node: NodeId,
        args: Vec<State>,
        interpret_only: bool,
    ) -> Result<State, FoldError> {
        self.stack().new_sub_frame(node)?;
        let entry = self.stack().depth();
        let result = CallStack::safe_execute(self, |ev| {
            let seed = if interpret_only {
                Instruction::Simple(node)
            } else {
                Instruction::Compound(node)
            };
            ev.stack().add_instruction(seed)?;
            for arg in args {
                ev.stack().push_state(arg)?;
            }
            let commands = ev.env.run(&*ev.ir)?;
            trace!(node = %ev.ir.describe(node), commands, "machine finished");
            if ev.stack().depth() != entry {
                return Err(FoldError::internal_error("machine stopped outside its sub-frame"));
            }
            ev.stack().pop_state()
        });
        self.stack().drop_sub_frame_without_propagation()?;
        result
    }

    /// Fold `node` in a fresh frame where `bindings` are the only known variables.
    pub fn fold(&mut self, node: NodeId, bindings: &[(Symbol, State)]) -> (NodeId, Option<State>) {
        self.stack().new_frame(node);
        for (symbol, state) in bindings {
            if let Err(error) = self.stack().add_variable(Variable::new(*symbol, state.clone())) {
                warn!(%error, "cannot bind {}", symbol);
            }
        }
        let folded = self.eval_child(node);
        if let Err(error) = self.stack().drop_frame() {
            warn!(%error, "fold frame already gone");
        }
        folded
    }

    /// Rewrite a function body (or any other node) with nothing known.
    pub fn interpret_block(&mut self, node: NodeId) -> NodeId {
        if self.ir.function(node).is_some() {
            self.fallback_function(node)
        } else {
            self.fold(node, &[]).0
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Walk
    // ═══════════════════════════════════════════════════════════════════════

    /// Transform a child, returning its new id and its value if known.
    fn eval_child(&mut self, node: NodeId) -> (NodeId, Option<State>) {
        let mark = self.stack().data_height();
        let rewritten = self.transform(node);
        let state = self.stack().pop_state_above(mark);
        (rewritten, state)
    }

    fn eval_children(&mut self, nodes: &[NodeId]) -> (Vec<NodeId>, Vec<Option<State>>) {
        nodes.iter().map(|node| self.eval_child(*node)).unzip()
    }

    fn push_known(&mut self, state: Option<State>) {
        if let Some(state) = state.filter(|s| !s.is_unknown())
            && let Err(error) = self.stack().push_state(state)
        {
            warn!(%error, "lost folded value");
        }
    }

    fn set_kind(&mut self, node: NodeId, kind: NodeKind) {
        self.ir.replace(node, kind);
    }

    fn is_const(&self, node: NodeId) -> bool {
        matches!(self.ir.kind(node), Some(NodeKind::Const(_)))
    }

    /// A literal node for a primitive state, on the line of `like`
    fn constant_node(&mut self, state: &State, like: NodeId) -> Option<NodeId> {
        let constant = state.to_constant()?;
        let line = self.ir.node(like).and_then(|n| n.line);
        trace!(node = %self.ir.describe(like), ?state, "folded to constant");
        Some(self.ir.push_at(NodeKind::Const(constant), line))
    }

    /// Push a fold result and pick the node that replaces `node`.
    ///
    /// Only a pure result whose operands are all literals may replace the
    /// node, since anything else would drop the operands' effects.
    fn commit(&mut self, node: NodeId, evaluated: Evaluated, operands: &[NodeId]) -> NodeId {
        let replaceable = evaluated.pure && operands.iter().all(|o| self.is_const(*o));
        let replacement = if replaceable {
            self.constant_node(&evaluated.state, node)
        } else {
            None
        };
        self.push_known(Some(evaluated.state));
        replacement.unwrap_or(node)
    }

    fn transform(&mut self, node: NodeId) -> NodeId {
        let Some(kind) = self.ir.kind(node).cloned() else {
            return node;
        };
        match kind {
            NodeKind::Const(constant) => {
                self.push_known(Some(State::from_constant(&constant)));
                node
            }
            NodeKind::GetValue(_) | NodeKind::GetField { .. } => {
                let evaluated = self.evaluate_tracked(node, Vec::new(), true);
                self.fallback_read(node, evaluated)
            }
            NodeKind::SetValue { symbol, value } => {
                let (value, state) = self.eval_child(value);
                self.fallback_set_value(node, symbol, value, state)
            }
            NodeKind::Variable {
                symbol,
                initializer,
            } => {
                let (initializer, state) = match initializer {
                    Some(init) => {
                        let (init, state) = self.eval_child(init);
                        (Some(init), state)
                    }
                    None => (None, None),
                };
                self.fallback_variable(node, symbol, initializer, state)
            }
            NodeKind::SetField {
                receiver,
                field,
                value,
            } => {
                let (value, state) = self.eval_child(value);
                self.fallback_set_field(node, receiver, field, value, state)
            }
            NodeKind::Call(call) => {
                let (call, states) = self.eval_call_operands(call);
                self.fallback_call(node, call, states, false)
            }
            NodeKind::ConstructorCall(call) => {
                let (call, states) = self.eval_call_operands(call);
                self.fallback_call(node, call, states, true)
            }
            NodeKind::Block(statements) => self.fallback_block(node, statements),
            NodeKind::When(branches) => self.eval_when(node, branches),
            NodeKind::While { .. } | NodeKind::DoWhile { .. } => self.fallback_loop(node),
            NodeKind::Try(_) => self.fallback_try(node),
            NodeKind::Catch(clause) => self.fallback_catch(node, clause),
            NodeKind::Throw(value) => {
                let (value, _) = self.eval_child(value);
                self.set_kind(node, NodeKind::Throw(value));
                node
            }
            NodeKind::Return { target, value } => {
                self.rewrite_return(node, target, value);
                node
            }
            NodeKind::Break { .. } | NodeKind::Continue { .. } => node,
            NodeKind::Function(_) => self.fallback_function(node),
            NodeKind::Lambda(function) => self.fallback_lambda(node, function),
            NodeKind::Invoke { callee, args } => {
                let (callee, callee_state) = self.eval_child(callee);
                let (args, states) = self.eval_children(&args);
                let operands = std::iter::once(callee).chain(args.iter().copied()).collect();
                self.set_kind(node, NodeKind::Invoke { callee, args });
                let states = std::iter::once(callee_state).chain(states).collect();
                self.fallback_invoke(node, operands, states)
            }
            NodeKind::StringConcat(parts) => {
                let (parts, states) = self.eval_children(&parts);
                self.set_kind(node, NodeKind::StringConcat(parts.clone()));
                self.fallback_operation(node, &parts, states)
            }
            NodeKind::TypeOperator {
                operator,
                operand,
                class,
            } => {
                let (operand, state) = self.eval_child(operand);
                self.set_kind(
                    node,
                    NodeKind::TypeOperator {
                        operator,
                        operand,
                        class,
                    },
                );
                self.fallback_operation(node, &[operand], vec![state])
            }
            NodeKind::Vararg(elements) => {
                let (elements, states) = self.eval_children(&elements);
                self.set_kind(node, NodeKind::Vararg(elements.clone()));
                self.fallback_operation(node, &elements, states)
            }
        }
    }

    /// Run a node with no effects of its own once every operand is known.
    fn fallback_operation(
        &mut self,
        node: NodeId,
        operands: &[NodeId],
        states: Vec<Option<State>>,
    ) -> NodeId {
        let Some(values) = states.into_iter().collect::<Option<Vec<_>>>() else {
            return node;
        };
        match self.evaluate_tracked(node, values, true) {
            Some(evaluated) => self.commit(node, evaluated, operands),
            None => node,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables and fields
    // ═══════════════════════════════════════════════════════════════════════

    fn fallback_read(&mut self, node: NodeId, evaluated: Option<Evaluated>) -> NodeId {
        match evaluated {
            Some(evaluated) => self.commit(node, evaluated, &[]),
            None => node,
        }
    }

    fn fallback_set_value(
        &mut self,
        node: NodeId,
        symbol: Symbol,
        value: NodeId,
        state: Option<State>,
    ) -> NodeId {
        self.set_kind(node, NodeKind::SetValue { symbol, value });
        let completes = state.is_some();
        let stored = match state {
            Some(state) if !self.escaped.contains(&symbol) => {
                self.evaluate(node, vec![state], true).is_some()
            }
            _ => false,
        };
        if !stored {
            self.stack().drop_state(symbol);
        }
        if completes {
            self.push_known(Some(State::unit()));
        }
        node
    }

    fn fallback_variable(
        &mut self,
        node: NodeId,
        symbol: Symbol,
        initializer: Option<NodeId>,
        state: Option<State>,
    ) -> NodeId {
        self.set_kind(
            node,
            NodeKind::Variable {
                symbol,
                initializer,
            },
        );
        let completes = initializer.is_none() || state.is_some();
        let value = if self.escaped.contains(&symbol) {
            State::Unknown
        } else {
            state.unwrap_or_default()
        };
        if let Err(error) = self.stack().add_variable(Variable::new(symbol, value)) {
            warn!(%error, "cannot declare {}", symbol);
        }
        if completes {
            self.push_known(Some(State::unit()));
        }
        node
    }

    fn fallback_set_field(
        &mut self,
        node: NodeId,
        receiver: Symbol,
        field: Symbol,
        value: NodeId,
        state: Option<State>,
    ) -> NodeId {
        self.set_kind(
            node,
            NodeKind::SetField {
                receiver,
                field,
                value,
            },
        );
        let stored = match state {
            Some(state) => self.evaluate(node, vec![state], true).is_some(),
            None => false,
        };
        if stored {
            self.push_known(Some(State::unit()));
        } else {
            self.forget_field(receiver, field);
        }
        node
    }

    /// Mark `receiver.field` unknown. An unresolved receiver may alias any
    /// object, so the field is forgotten on all of them.
    fn forget_field(&mut self, receiver: Symbol, field: Symbol) {
        if let Err(error) = self
            .stack()
            .set_field_for_receiver(receiver, field, State::Unknown)
        {
            trace!(%error, %field, "receiver unresolved");
            self.stack().forget_field_everywhere(field);
        }
    }

    /// Forget every object-valued variable of the current frame.
    fn forget_objects(&mut self) {
        let objects: Vec<Symbol> = self
            .stack()
            .frame_variables()
            .into_iter()
            .filter(|v| v.state().may_reference_objects())
            .map(|v| v.symbol)
            .collect();
        for symbol in objects {
            trace!(%symbol, "object may be written by an opaque call");
            self.stack().drop_state(symbol);
        }
    }

    fn forget_effects(&mut self, effects: &Effects) {
        for symbol in &effects.variables {
            self.stack().drop_state(*symbol);
        }
        for (receiver, field) in &effects.fields {
            self.forget_field(*receiver, *field);
        }
        if effects.opaque_calls {
            self.forget_objects();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    fn eval_call_operands(&mut self, call: Call) -> (Call, Vec<Option<State>>) {
        let (dispatch_receiver, dispatch_state) = match call.dispatch_receiver {
            Some(receiver) => {
                let (receiver, state) = self.eval_child(receiver);
                (Some(receiver), Some(state))
            }
            None => (None, None),
        };
        let (extension_receiver, extension_state) = match call.extension_receiver {
            Some(receiver) => {
                let (receiver, state) = self.eval_child(receiver);
                (Some(receiver), Some(state))
            }
            None => (None, None),
        };
        let (args, arg_states) = self.eval_children(&call.args);
        let states = dispatch_state
            .into_iter()
            .chain(extension_state)
            .chain(arg_states)
            .collect();
        let call = Call {
            callee: call.callee,
            dispatch_receiver,
            extension_receiver,
            args,
        };
        (call, states)
    }

    fn is_foldable(&self, callee: Symbol) -> bool {
        let mode = self.env.config().mode;
        self.env
            .declarations()
            .function(callee)
            .is_some_and(|declaration| mode.can_evaluate_function(declaration))
    }

    fn fallback_call(
        &mut self,
        node: NodeId,
        call: Call,
        states: Vec<Option<State>>,
        constructor: bool,
    ) -> NodeId {
        let callee = call.callee;
        let operands = call.operands();
        let kind = if constructor {
            NodeKind::ConstructorCall(call)
        } else {
            NodeKind::Call(call)
        };
        self.set_kind(node, kind);

        if self.is_foldable(callee)
            && let Some(args) = states.into_iter().collect::<Option<Vec<_>>>()
            && let Some(evaluated) = self.evaluate_tracked(node, args, true)
        {
            if constructor {
                self.push_known(Some(evaluated.state));
                return node;
            }
            return self.commit(node, evaluated, &operands);
        }

        if self.env.declarations().intrinsic(callee).is_none() {
            self.forget_objects();
        }
        node
    }

    fn fallback_invoke(
        &mut self,
        node: NodeId,
        operands: Vec<NodeId>,
        states: Vec<Option<State>>,
    ) -> NodeId {
        if self.env.config().mode.can_invoke_closures()
            && let Some(values) = states.into_iter().collect::<Option<Vec<_>>>()
            && let Some(evaluated) = self.evaluate_tracked(node, values, true)
        {
            return self.commit(node, evaluated, &operands);
        }
        self.forget_objects();
        node
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Control flow
    // ═══════════════════════════════════════════════════════════════════════

    /// Statements after a jump are unreachable and dropped. The block has a
    /// value only when every statement is known to complete.
    fn fallback_block(&mut self, node: NodeId, statements: Vec<NodeId>) -> NodeId {
        if let Err(error) = self.stack().new_sub_frame(node) {
            warn!(%error, "cannot enter block");
            return node;
        }
        let mut rewritten = Vec::with_capacity(statements.len());
        let mut value = Some(State::unit());
        let mut completes = true;
        for statement in &statements {
            // A return to this block supplies the block's value
            let (statement, state, returns_here) = match self.ir.kind(*statement).cloned() {
                Some(NodeKind::Return { target, value }) if target == node => {
                    let state = self.rewrite_return(*statement, target, value);
                    (*statement, state, true)
                }
                _ => {
                    let (statement, state) = self.eval_child(*statement);
                    (statement, state, false)
                }
            };
            rewritten.push(statement);
            completes &= state.is_some();
            value = state.filter(|_| completes);
            if self.ir.kind(statement).is_some_and(NodeKind::is_jump) {
                if rewritten.len() < statements.len() {
                    trace!(block = %self.ir.describe(node), "dropping unreachable statements");
                }
                if !returns_here {
                    value = None;
                }
                break;
            }
        }
        if let Err(error) = self.stack().drop_sub_frame_without_propagation() {
            warn!(%error, "block sub-frame already gone");
        }
        self.set_kind(node, NodeKind::Block(rewritten));
        self.push_known(value);
        node
    }

    /// Rewrite a return's value; the value's state is what the target receives.
    fn rewrite_return(&mut self, node: NodeId, target: NodeId, value: NodeId) -> Option<State> {
        let (value, state) = self.eval_child(value);
        self.set_kind(node, NodeKind::Return { target, value });
        state
    }

    /// Fold branch by branch until a condition is unknown.
    ///
    /// A `when` whose conditions up to the taken branch all became literals is
    /// replaced by that branch's result.
    fn eval_when(&mut self, node: NodeId, mut branches: Vec<Branch>) -> NodeId {
        for index in 0..branches.len() {
            let Some(branch) = branches.get(index).copied() else {
                break;
            };
            let (condition, state) = self.eval_child(branch.condition);
            if let Some(b) = branches.get_mut(index) {
                b.condition = condition;
            }
            match state.and_then(|s| s.as_bool()) {
                Some(false) => {}
                Some(true) => {
                    let (result, value) = self.eval_child(branch.result);
                    if let Some(b) = branches.get_mut(index) {
                        b.result = result;
                    }
                    let decided = branches
                        .iter()
                        .take(index + 1)
                        .all(|b| self.is_const(b.condition));
                    self.set_kind(node, NodeKind::When(branches));
                    self.push_known(value);
                    if decided {
                        trace!(node = %self.ir.describe(node), index, "when resolved");
                        return result;
                    }
                    return node;
                }
                None => {
                    self.fallback_when(node, branches, index);
                    return node;
                }
            }
        }
        self.set_kind(node, NodeKind::When(branches));
        self.push_known(Some(State::unit()));
        node
    }

    /// Visit every branch from `from` on without committing anything they do.
    fn fallback_when(&mut self, node: NodeId, mut branches: Vec<Branch>, from: usize) {
        CallStack::remove_all_mutated_variables_and_fields(self, |ev| {
            for index in from..branches.len() {
                let Some(branch) = branches.get(index).copied() else {
                    break;
                };
                let condition = if index == from {
                    branch.condition
                } else {
                    ev.eval_child(branch.condition).0
                };
                let mut result = branch.result;
                CallStack::rollback_all_changes(ev, |ev| {
                    result = ev.eval_child(branch.result).0;
                    true
                });
                if let Some(b) = branches.get_mut(index) {
                    *b = Branch { condition, result };
                }
            }
            true
        });
        self.set_kind(node, NodeKind::When(branches));
    }

    /// Try the whole loop on the machine; otherwise rewrite it with everything
    /// it assigns unknown.
    fn fallback_loop(&mut self, node: NodeId) -> NodeId {
        if self.evaluate(node, Vec::new(), false).is_some() {
            trace!(node = %self.ir.describe(node), "loop folded");
            self.push_known(Some(State::unit()));
            return node;
        }
        let effects = Effects::of(self.ir, self.env.declarations(), node);
        self.forget_effects(&effects);
        let Some(kind) = self.ir.kind(node).cloned() else {
            return node;
        };
        CallStack::remove_all_mutated_variables_and_fields(self, |ev| {
            let kind = match kind {
                NodeKind::While { condition, body } => {
                    let (condition, _) = ev.eval_child(condition);
                    let (body, _) = ev.eval_child(body);
                    NodeKind::While { condition, body }
                }
                NodeKind::DoWhile { condition, body } => {
                    let (body, _) = ev.eval_child(body);
                    let (condition, _) = ev.eval_child(condition);
                    NodeKind::DoWhile { condition, body }
                }
                other => other,
            };
            ev.set_kind(node, kind);
            true
        });
        node
    }

    /// Try the whole region on the machine; otherwise rewrite body, catch
    /// clauses and finally independently, each from the same forgotten state.
    fn fallback_try(&mut self, node: NodeId) -> NodeId {
        if let Some(evaluated) = self.evaluate_tracked(node, Vec::new(), false) {
            trace!(node = %self.ir.describe(node), "try folded");
            return self.commit(node, evaluated, &[]);
        }
        let effects = Effects::of(self.ir, self.env.declarations(), node);
        self.forget_effects(&effects);
        let Some(NodeKind::Try(mut region)) = self.ir.kind(node).cloned() else {
            return node;
        };
        CallStack::remove_all_mutated_variables_and_fields(self, |ev| {
            let parts = std::iter::once(region.body)
                .chain(region.catches.iter().copied())
                .chain(region.finally)
                .collect::<Vec<_>>();
            let mut rewritten = Vec::with_capacity(parts.len());
            for part in parts {
                let mut new_part = part;
                CallStack::rollback_all_changes(ev, |ev| {
                    new_part = ev.eval_child(part).0;
                    true
                });
                rewritten.push(new_part);
            }
            let mut rewritten = rewritten.into_iter();
            region.body = rewritten.next().unwrap_or(region.body);
            for catch in region.catches.iter_mut() {
                *catch = rewritten.next().unwrap_or(*catch);
            }
            region.finally = region.finally.map(|f| rewritten.next().unwrap_or(f));
            ev.set_kind(node, NodeKind::Try(region));
            true
        });
        node
    }

    fn fallback_catch(&mut self, node: NodeId, clause: Catch) -> NodeId {
        if let Err(error) = self.stack().new_sub_frame(node) {
            warn!(%error, "cannot enter catch clause");
            return node;
        }
        if let Err(error) = self
            .stack()
            .add_variable(Variable::new(clause.parameter, State::Unknown))
        {
            warn!(%error, "cannot bind catch parameter");
        }
        let (result, _) = self.eval_child(clause.result);
        if let Err(error) = self.stack().drop_sub_frame_without_propagation() {
            warn!(%error, "catch sub-frame already gone");
        }
        self.set_kind(node, NodeKind::Catch(Catch { result, ..clause }));
        node
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions and closures
    // ═══════════════════════════════════════════════════════════════════════

    /// Rewrite a function body in its own frame with every parameter unknown.
    fn fallback_function(&mut self, node: NodeId) -> NodeId {
        let Some(function) = self.ir.function(node).cloned() else {
            return node;
        };
        self.stack().new_frame(node);
        for symbol in function.receiver.iter().chain(function.params.iter()) {
            if let Err(error) = self.stack().add_variable(Variable::new(*symbol, State::Unknown)) {
                warn!(%error, "cannot bind parameter {}", symbol);
            }
        }
        let defaults = function
            .defaults
            .iter()
            .map(|(param, value)| (*param, self.eval_child(*value).0))
            .collect();
        let (body, _) = self.eval_child(function.body);
        if let Err(error) = self.stack().drop_frame() {
            warn!(%error, "function frame already gone");
        }
        self.set_kind(
            node,
            NodeKind::Function(Function {
                defaults,
                body,
                ..function
            }),
        );
        node
    }

    /// Whatever the lambda body may write stays unknown from here on, since
    /// the lambda can run at any later point.
    fn fallback_lambda(&mut self, node: NodeId, function: NodeId) -> NodeId {
        let effects = Effects::of(self.ir, self.env.declarations(), function);
        let mut escaping: Vec<Symbol> = effects.variables.iter().copied().collect();
        escaping.extend(effects.fields.iter().map(|(receiver, _)| *receiver));
        if effects.opaque_calls {
            escaping.extend(
                self.stack()
                    .frame_variables()
                    .into_iter()
                    .filter(|v| v.state().may_reference_objects())
                    .map(|v| v.symbol),
            );
        }
        for symbol in escaping {
            self.escaped.insert(symbol);
            self.stack().drop_state(symbol);
        }
        for (_, field) in &effects.fields {
            self.stack().forget_field_everywhere(*field);
        }

        let closure = self.evaluate(node, Vec::new(), true);
        self.fallback_function(function);
        self.push_known(closure);
        node
    }
}
