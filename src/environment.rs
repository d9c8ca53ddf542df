//! Per-fold execution environment
//!
//! Owns the private call stack of one folder together with the declaration
//! metadata, the builtin semantics and the configuration it runs under.

use crate::builtins::{BuiltinEvaluator, Intrinsics};
use crate::config::FoldConfig;
use crate::declarations::Declarations;
use crate::error::FoldError;
use crate::interpreter::Interpreter;
use crate::ir::Ir;
use crate::stack::CallStack;

pub struct Environment<'a> {
    call_stack: CallStack,
    declarations: &'a Declarations,
    builtins: Box<dyn BuiltinEvaluator + 'a>,
    config: FoldConfig,
}

impl<'a> Environment<'a> {
    pub fn new(declarations: &'a Declarations, config: FoldConfig) -> Self {
        Environment {
            call_stack: CallStack::new(),
            declarations,
            builtins: Box::new(Intrinsics),
            config,
        }
    }

    pub fn set_builtins(&mut self, builtins: impl BuiltinEvaluator + 'a) {
        self.builtins = Box::new(builtins);
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub fn call_stack_mut(&mut self) -> &mut CallStack {
        &mut self.call_stack
    }

    pub fn declarations(&self) -> &'a Declarations {
        self.declarations
    }

    pub fn config(&self) -> &FoldConfig {
        &self.config
    }

    /// Run the machine until the current sub-frame has no instructions left.
    pub fn run(&mut self, ir: &Ir) -> Result<usize, FoldError> {
        let mut interpreter = Interpreter::new(
            &mut self.call_stack,
            ir,
            self.declarations,
            self.builtins.as_ref(),
            &self.config,
        );
        interpreter.run()?;
        Ok(interpreter.commands())
    }
}

impl AsMut<CallStack> for Environment<'_> {
    fn as_mut(&mut self) -> &mut CallStack {
        &mut self.call_stack
    }
}
