//! Speculative constant folding over expression trees
//!
//! A [`Folder`] partially executes an expression tree at compile time. Subtrees
//! whose value can be proven are replaced by literals; everything else is left
//! in place. Evaluation runs on an explicit stack machine, and anything it
//! writes while an attempt is still speculative is rolled back when the attempt
//! fails.
//!
//! # Example
//!
//! ```
//! use irfold::{Folder, Intrinsic, IrBuilder, State};
//!
//! let mut b = IrBuilder::new();
//! let a = b.symbol("a");
//! let get_a = b.get(a);
//! let one = b.int(1);
//! let is_one = b.op(Intrinsic::Eq, vec![get_a, one]);
//! let yes = b.string("one");
//! let no = b.string("other");
//! let when = b.if_else(is_one, yes, no);
//! let (mut ir, declarations) = b.finish();
//!
//! let mut folder = Folder::new(&declarations);
//! let folded = folder.evaluate_with(&mut ir, when, &[(a, State::int(1))]);
//! assert_eq!(folded, Some(State::string("one")));
//! ```

pub mod builtins;
pub mod config;
pub mod declarations;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod ir;
pub mod stack;
pub mod state;

pub use builtins::{BuiltinEvaluator, BuiltinFailure, Intrinsic, Intrinsics};
pub use config::{EvaluationMode, FoldConfig};
pub use declarations::{Callee, Declarations, FunctionDecl};
pub use environment::Environment;
pub use error::FoldError;
pub use evaluator::Evaluator;
pub use ir::{
    Branch, Call, Catch, Constant, Function, Ir, IrBuilder, NodeId, NodeKind, Symbol, Try,
    TypeOperator,
};
pub use stack::CallStack;
pub use state::{CheapClone, State, Variable};

/// Entry point for folding expression trees against one set of declarations.
///
/// A folder owns its call stack; use one folder per concurrent fold.
pub struct Folder<'a> {
    env: Environment<'a>,
}

impl<'a> Folder<'a> {
    pub fn new(declarations: &'a Declarations) -> Self {
        Self::with_config(declarations, FoldConfig::default())
    }

    pub fn with_config(declarations: &'a Declarations, config: FoldConfig) -> Self {
        Folder {
            env: Environment::new(declarations, config),
        }
    }

    /// Replace the semantics of intrinsic calls.
    pub fn with_builtins(mut self, builtins: impl BuiltinEvaluator + 'a) -> Self {
        self.env.set_builtins(builtins);
        self
    }

    pub fn config(&self) -> &FoldConfig {
        self.env.config()
    }

    pub fn call_stack(&self) -> &CallStack {
        self.env.call_stack()
    }

    /// Fold `node` in place and return its value if it could be proven.
    ///
    /// Never fails: anything that cannot be folded is left as it was.
    pub fn evaluate(&mut self, ir: &mut Ir, node: NodeId) -> Option<State> {
        self.evaluate_with(ir, node, &[])
    }

    /// Like [`Folder::evaluate`], with `bindings` known on entry.
    pub fn evaluate_with(
        &mut self,
        ir: &mut Ir,
        node: NodeId,
        bindings: &[(Symbol, State)],
    ) -> Option<State> {
        let (rewritten, state) = Evaluator::new(&mut self.env, ir).fold(node, bindings);
        // Callers hold on to `node`, so the replacement moves into its slot
        if rewritten != node
            && let Some(kind) = ir.kind(rewritten).cloned()
        {
            ir.replace(node, kind);
        }
        state
    }

    /// Rewrite a function body, or any other subtree, with nothing known on entry.
    pub fn interpret_block(&mut self, ir: &mut Ir, node: NodeId) -> NodeId {
        Evaluator::new(&mut self.env, ir).interpret_block(node)
    }
}
