//! The folding stack machine
//!
//! Executes [`Instruction`]s from the innermost sub-frame of a [`CallStack`]
//! until that sub-frame's queue is empty. `Compound` unfolds a node into the
//! instructions that evaluate its operands, `Simple` executes the node with its
//! operands already on the data stack. Nothing here catches errors: a failing
//! instruction aborts the run and the caller's `safe_execute` boundary unwinds.

mod calls;

use tracing::{trace, warn};

use crate::builtins::BuiltinEvaluator;
use crate::config::FoldConfig;
use crate::declarations::Declarations;
use crate::error::FoldError;
use crate::ir::{Ir, NodeId, NodeKind, Symbol, TypeOperator};
use crate::stack::{CallStack, Instruction};
use crate::state::{ClosureState, State, Variable};

pub struct Interpreter<'a> {
    stack: &'a mut CallStack,
    ir: &'a Ir,
    declarations: &'a Declarations,
    builtins: &'a dyn BuiltinEvaluator,
    config: &'a FoldConfig,
    commands: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        stack: &'a mut CallStack,
        ir: &'a Ir,
        declarations: &'a Declarations,
        builtins: &'a dyn BuiltinEvaluator,
        config: &'a FoldConfig,
    ) -> Self {
        Interpreter {
            stack,
            ir,
            declarations,
            builtins,
            config,
            commands: 0,
        }
    }

    /// Instructions executed so far
    pub fn commands(&self) -> usize {
        self.commands
    }

    pub fn run(&mut self) -> Result<(), FoldError> {
        while let Some(instruction) = self.stack.pop_instruction() {
            self.commands += 1;
            if self.commands > self.config.max_commands {
                warn!(limit = self.config.max_commands, "command limit reached");
                return Err(FoldError::CommandLimit {
                    limit: self.config.max_commands,
                });
            }
            trace!(%instruction, "execute");
            self.execute(instruction)?;
        }
        Ok(())
    }

    fn kind(&self, node: NodeId) -> Result<&'a NodeKind, FoldError> {
        let ir: &'a Ir = self.ir;
        ir.kind(node)
            .ok_or_else(|| FoldError::internal_error(format!("dangling node {}", node)))
    }

    fn push(&mut self, instruction: Instruction) -> Result<(), FoldError> {
        self.stack.add_instruction(instruction)
    }

    fn execute(&mut self, instruction: Instruction) -> Result<(), FoldError> {
        match instruction {
            Instruction::Simple(node) => self.interpret(node),
            Instruction::Compound(node) => self.unfold(node),
            Instruction::Discard => self.stack.pop_state().map(drop),
            Instruction::Branch { node, index } => self.branch(node, index),
            Instruction::Catch(node) => self.try_catch_clause(node),
            Instruction::Rethrow(node) => self.rethrow(node),
            Instruction::PropagateThrow => self.stack.drop_frames_until_try_catch(self.ir),
            Instruction::BindParameter(param) => {
                let value = self.stack.pop_state()?;
                self.stack.add_variable(Variable::new(param, value))
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Compound: schedule operands
    // ═══════════════════════════════════════════════════════════════════════

    fn unfold(&mut self, node: NodeId) -> Result<(), FoldError> {
        match self.kind(node)? {
            NodeKind::Const(_)
            | NodeKind::GetValue(_)
            | NodeKind::GetField { .. }
            | NodeKind::Break { .. }
            | NodeKind::Continue { .. }
            | NodeKind::Lambda(_)
            | NodeKind::Variable {
                initializer: None, ..
            } => self.push(Instruction::Simple(node)),
            NodeKind::SetValue { value, .. }
            | NodeKind::SetField { value, .. }
            | NodeKind::Throw(value)
            | NodeKind::Return { value, .. }
            | NodeKind::TypeOperator { operand: value, .. }
            | NodeKind::Variable {
                initializer: Some(value),
                ..
            } => {
                self.push(Instruction::Simple(node))?;
                self.push(Instruction::Compound(*value))
            }
            NodeKind::Call(call) | NodeKind::ConstructorCall(call) => {
                self.push_operands(node, &call.operands())
            }
            NodeKind::StringConcat(parts) | NodeKind::Vararg(parts) => self.push_operands(node, parts),
            NodeKind::Invoke { callee, args } => {
                self.push_operands(node, args)?;
                self.push(Instruction::Compound(*callee))
            }
            NodeKind::Block(statements) => {
                self.stack.new_sub_frame(node)?;
                self.push(Instruction::Simple(node))?;
                if statements.is_empty() {
                    return self.stack.push_state(State::unit());
                }
                for (index, statement) in statements.iter().enumerate().rev() {
                    if index + 1 < statements.len() {
                        self.push(Instruction::Discard)?;
                    }
                    self.push(Instruction::Compound(*statement))?;
                }
                Ok(())
            }
            NodeKind::When(branches) => match branches.first() {
                Some(first) => {
                    self.push(Instruction::Branch { node, index: 0 })?;
                    self.push(Instruction::Compound(first.condition))
                }
                None => self.stack.push_state(State::unit()),
            },
            NodeKind::While { condition, .. } => {
                self.stack.new_sub_frame(node)?;
                self.push(Instruction::Simple(node))?;
                self.push(Instruction::Compound(*condition))
            }
            NodeKind::DoWhile { condition, body } => {
                self.stack.new_sub_frame(node)?;
                self.push(Instruction::Simple(node))?;
                self.push(Instruction::Compound(*condition))?;
                self.push(Instruction::Discard)?;
                self.push(Instruction::Compound(*body))
            }
            NodeKind::Try(region) => {
                self.stack.new_sub_frame(node)?;
                self.push(Instruction::Simple(node))?;
                self.push(Instruction::Compound(region.body))
            }
            NodeKind::Catch(_) | NodeKind::Function(_) => Err(FoldError::internal_error(format!(
                "{} cannot be evaluated on its own",
                self.ir.describe(node)
            ))),
        }
    }

    /// Queue `Simple(node)` after the operands, first operand running first.
    fn push_operands(&mut self, node: NodeId, operands: &[NodeId]) -> Result<(), FoldError> {
        self.push(Instruction::Simple(node))?;
        for operand in operands.iter().rev() {
            self.push(Instruction::Compound(*operand))?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Simple: execute with operands on the data stack
    // ═══════════════════════════════════════════════════════════════════════

    fn interpret(&mut self, node: NodeId) -> Result<(), FoldError> {
        match self.kind(node)? {
            NodeKind::Const(constant) => self.stack.push_state(State::from_constant(constant)),
            NodeKind::GetValue(symbol) => {
                let state = self.stack.get_state(*symbol)?;
                self.stack.push_state(state)
            }
            NodeKind::SetValue { symbol, .. } => {
                let value = self.stack.pop_state()?;
                self.stack.set_state(*symbol, value)?;
                self.stack.push_state(State::unit())
            }
            NodeKind::Variable {
                symbol,
                initializer,
            } => {
                let value = match initializer {
                    Some(_) => self.stack.pop_state()?,
                    None => State::Unknown,
                };
                self.stack.add_variable(Variable::new(*symbol, value))?;
                self.stack.push_state(State::unit())
            }
            NodeKind::GetField { receiver, field } => {
                let state = self.stack.get_field(*receiver, *field)?;
                self.stack.push_state(state)
            }
            NodeKind::SetField {
                receiver, field, ..
            } => {
                let value = self.stack.pop_state()?;
                self.stack.set_field_for_receiver(*receiver, *field, value)?;
                self.stack.push_state(State::unit())
            }
            NodeKind::Call(call) => {
                let args = self.pop_arguments(call.expected_argument_count())?;
                self.call(call.callee, args)
            }
            NodeKind::ConstructorCall(call) => {
                let args = self.pop_arguments(call.expected_argument_count())?;
                self.construct(call.callee, args)
            }
            NodeKind::Block(_) | NodeKind::Catch(_) => self.stack.drop_sub_frame(),
            NodeKind::When(_) => Err(FoldError::internal_error("when has no simple form")),
            NodeKind::While { condition, body } | NodeKind::DoWhile { condition, body } => {
                self.loop_check(node, *condition, *body)
            }
            NodeKind::Try(region) => match region.finally {
                Some(finally) => {
                    let result = self.stack.pop_state()?;
                    self.stack.drop_sub_frame_without_propagation()?;
                    self.stack.push_state(result)?;
                    self.push(Instruction::Discard)?;
                    self.push(Instruction::Compound(finally))
                }
                None => self.stack.drop_sub_frame(),
            },
            NodeKind::Throw(_) => self.stack.drop_frames_until_try_catch(self.ir),
            NodeKind::Return { .. } => self.stack.return_from_frame_with_result(self.ir, node),
            NodeKind::Break { .. } | NodeKind::Continue { .. } => {
                self.stack.unroll_instructions_for_break_continue(self.ir, node)
            }
            NodeKind::Function(function) => self.complete_call(function),
            NodeKind::Lambda(function) => {
                let closure = ClosureState::new(*function);
                self.stack.store_up_values(&closure)?;
                self.stack.push_state(State::Closure(closure))
            }
            NodeKind::Invoke { args, .. } => {
                let args = self.pop_arguments(args.len())?;
                let callee = self.stack.pop_state()?;
                self.invoke(callee, args)
            }
            NodeKind::StringConcat(parts) => {
                let values = self.pop_arguments(parts.len())?;
                let mut text = String::new();
                for value in values {
                    match value {
                        State::Primitive(p) => text.push_str(&p.to_display_string()),
                        other => {
                            return Err(FoldError::builtin(format!(
                                "cannot concatenate {:?}",
                                other
                            )));
                        }
                    }
                }
                self.stack.push_state(State::string(text))
            }
            NodeKind::TypeOperator {
                operator, class, ..
            } => {
                let value = self.stack.pop_state()?;
                self.type_operator(*operator, value, *class)
            }
            NodeKind::Vararg(elements) => {
                let elements = self.pop_arguments(elements.len())?;
                self.stack.push_state(State::array(elements))
            }
        }
    }

    fn type_operator(
        &mut self,
        operator: TypeOperator,
        value: State,
        class: Symbol,
    ) -> Result<(), FoldError> {
        let matches = self.declarations.is_instance(&value, class);
        let result = match operator {
            TypeOperator::Is => State::bool(matches),
            TypeOperator::NotIs => State::bool(!matches),
            TypeOperator::Cast | TypeOperator::SafeCast if matches => value,
            TypeOperator::SafeCast => State::null(),
            TypeOperator::Cast => {
                let message = format!(
                    "{:?} cannot be cast to {}",
                    value,
                    self.ir.symbols().name(class)
                );
                self.stack
                    .push_state(State::exception(Symbol::CLASS_CAST_EXCEPTION, message))?;
                return self.stack.drop_frames_until_try_catch(self.ir);
            }
        };
        self.stack.push_state(result)
    }

    fn pop_arguments(&mut self, count: usize) -> Result<Vec<State>, FoldError> {
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.stack.pop_state()?);
        }
        args.reverse();
        Ok(args)
    }

    fn pop_condition(&mut self) -> Result<bool, FoldError> {
        let condition = self.stack.pop_state()?;
        condition.as_bool().ok_or_else(|| {
            FoldError::internal_error(format!("condition evaluated to {:?}", condition))
        })
    }

    fn loop_check(&mut self, node: NodeId, condition: NodeId, body: NodeId) -> Result<(), FoldError> {
        if self.pop_condition()? {
            self.push(Instruction::Simple(node))?;
            self.push(Instruction::Compound(condition))?;
            self.push(Instruction::Discard)?;
            self.push(Instruction::Compound(body))
        } else {
            self.stack.drop_sub_frame_without_propagation()?;
            self.stack.push_state(State::unit())
        }
    }

    fn branch(&mut self, node: NodeId, index: usize) -> Result<(), FoldError> {
        let NodeKind::When(branches) = self.kind(node)? else {
            return Err(FoldError::internal_error(format!("{} is not a when", node)));
        };
        if self.pop_condition()? {
            let branch = branches
                .get(index)
                .ok_or_else(|| FoldError::internal_error("branch index out of range"))?;
            return self.push(Instruction::Compound(branch.result));
        }
        match branches.get(index + 1) {
            Some(next) => {
                self.push(Instruction::Branch {
                    node,
                    index: index + 1,
                })?;
                self.push(Instruction::Compound(next.condition))
            }
            None => self.stack.push_state(State::unit()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Exceptions
    // ═══════════════════════════════════════════════════════════════════════

    fn catches(&self, thrown: &State, catch_type: Option<Symbol>) -> bool {
        match catch_type {
            None => true,
            Some(class) => thrown
                .class()
                .is_some_and(|c| self.declarations.is_subclass(c, class)),
        }
    }

    /// The thrown value is on top of the try region's data stack. On a match
    /// the remaining clauses are discarded and the clause body runs in its own
    /// sub-frame with the parameter bound.
    fn try_catch_clause(&mut self, node: NodeId) -> Result<(), FoldError> {
        let NodeKind::Catch(clause) = self.kind(node)? else {
            return Err(FoldError::internal_error(format!("{} is not a catch", node)));
        };
        let thrown = self
            .stack
            .peek_state()
            .cloned()
            .ok_or(FoldError::StackUnderflow)?;
        if !self.catches(&thrown, clause.catch_type) {
            return Ok(());
        }
        trace!(clause = %self.ir.describe(node), "caught");
        self.stack.pop_state()?;
        let region = self.stack.current_sub_frame_mut()?;
        if let Some(exit) = region.drop_instructions() {
            region.push_instruction(exit);
        }
        self.stack.new_sub_frame(node)?;
        self.stack
            .add_variable(Variable::new(clause.parameter, thrown))?;
        self.push(Instruction::Simple(node))?;
        self.push(Instruction::Compound(clause.result))
    }

    /// No clause matched: leave the region, run its finally, keep unwinding.
    fn rethrow(&mut self, node: NodeId) -> Result<(), FoldError> {
        let NodeKind::Try(region) = self.kind(node)? else {
            return Err(FoldError::internal_error(format!("{} is not a try", node)));
        };
        let thrown = self.stack.pop_state()?;
        self.stack.drop_sub_frame_without_propagation()?;
        self.stack.push_state(thrown)?;
        match region.finally {
            Some(finally) => {
                self.push(Instruction::PropagateThrow)?;
                self.push(Instruction::Discard)?;
                self.push(Instruction::Compound(finally))
            }
            None => self.stack.drop_frames_until_try_catch(self.ir),
        }
    }
}
