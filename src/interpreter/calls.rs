use tracing::warn;

use crate::builtins::BuiltinFailure;
use crate::declarations::{Callee, Declarations, FunctionDecl};
use crate::error::FoldError;
use crate::ir::{Function, Ir, NodeId, Symbol};
use crate::stack::Instruction;
use crate::state::{ClosureRef, ObjectState, State, Variable};

use super::Interpreter;

impl<'a> Interpreter<'a> {
    fn callee_name(&self, symbol: Symbol) -> String {
        self.ir.symbols().name(symbol).to_string()
    }

    /// Declaration of a callee the current mode allows to run
    fn declaration(&self, callee: Symbol) -> Result<&'a FunctionDecl, FoldError> {
        let declarations: &'a Declarations = self.declarations;
        let declaration = declarations
            .function(callee)
            .ok_or_else(|| FoldError::unknown_callee(self.callee_name(callee)))?;
        if !self.config.mode.can_evaluate_function(declaration) {
            return Err(FoldError::not_foldable(self.callee_name(callee)));
        }
        Ok(declaration)
    }

    pub(super) fn call(&mut self, callee: Symbol, args: Vec<State>) -> Result<(), FoldError> {
        match self.declaration(callee)?.callee {
            Callee::Intrinsic(intrinsic) => match self.builtins.evaluate(intrinsic, &args) {
                Ok(state) => self.stack.push_state(state),
                Err(BuiltinFailure::Thrown(thrown)) => {
                    self.stack.push_state(thrown)?;
                    self.stack.drop_frames_until_try_catch(self.ir)
                }
                Err(BuiltinFailure::Unsupported(message)) => Err(FoldError::builtin(message)),
            },
            Callee::Function(function) => self.enter_function(function, args, None),
        }
    }

    pub(super) fn construct(&mut self, callee: Symbol, args: Vec<State>) -> Result<(), FoldError> {
        match self.declaration(callee)?.callee {
            Callee::Function(function) => self.enter_function(function, args, None),
            Callee::Intrinsic(intrinsic) => Err(FoldError::internal_error(format!(
                "intrinsic {} used as a constructor",
                intrinsic
            ))),
        }
    }

    pub(super) fn invoke(&mut self, callee: State, args: Vec<State>) -> Result<(), FoldError> {
        let closure = callee
            .as_closure()
            .cloned()
            .ok_or_else(|| FoldError::internal_error(format!("{:?} is not callable", callee)))?;
        if !self.config.mode.can_invoke_closures() {
            return Err(FoldError::not_foldable("lambda"));
        }
        self.enter_function(closure.function(), args, Some(&closure))
    }

    /// Push a frame for `function` and bind its receiver and parameters.
    ///
    /// A constructor's receiver is a fresh object of the constructed class;
    /// otherwise the receiver takes the first argument. Parameters without an
    /// argument are bound by running their defaults before the body.
    fn enter_function(
        &mut self,
        function: NodeId,
        args: Vec<State>,
        closure: Option<&ClosureRef>,
    ) -> Result<(), FoldError> {
        let ir: &'a Ir = self.ir;
        let declaration = ir
            .function(function)
            .ok_or_else(|| FoldError::internal_error(format!("{} is not a function", function)))?;
        if self.stack.frame_count() >= self.config.max_frames {
            warn!(limit = self.config.max_frames, "frame limit reached");
            return Err(FoldError::StackOverflow {
                limit: self.config.max_frames,
            });
        }

        let mut args = args.into_iter();
        self.stack.new_frame(function);
        if let Some(closure) = closure {
            self.stack.load_up_values(closure)?;
        }
        match (declaration.constructed_class, declaration.receiver) {
            (Some(class), Some(receiver)) => {
                let this = State::Object(ObjectState::new(class));
                self.stack.add_variable(Variable::new(receiver, this))?;
            }
            (Some(_), None) => {
                return Err(FoldError::internal_error("constructor without a receiver"));
            }
            (None, Some(receiver)) => {
                let this = args.next().ok_or(FoldError::StackUnderflow)?;
                self.stack.add_variable(Variable::new(receiver, this))?;
            }
            (None, None) => {}
        }
        let mut defaults = Vec::new();
        for param in &declaration.params {
            match args.next() {
                Some(value) => self.stack.add_variable(Variable::new(*param, value))?,
                None => {
                    let default = declaration
                        .default_of(*param)
                        .ok_or_else(|| FoldError::missing_argument(self.callee_name(*param)))?;
                    defaults.push((*param, default));
                }
            }
        }

        self.push(Instruction::Simple(function))?;
        self.push(Instruction::Compound(declaration.body))?;
        // Defaults run in parameter order, each seeing the parameters before it
        for (param, default) in defaults.into_iter().rev() {
            self.push(Instruction::BindParameter(param))?;
            self.push(Instruction::Compound(default))?;
        }
        Ok(())
    }

    /// Leave the frame of a finished call and hand its result to the caller.
    pub(super) fn complete_call(&mut self, function: &Function) -> Result<(), FoldError> {
        let result = match (function.constructed_class, function.receiver) {
            (Some(_), Some(receiver)) => self.stack.get_state(receiver)?,
            _ => self.stack.pop_state()?,
        };
        self.stack.drop_frame()?;
        self.stack.push_state(result)
    }
}
