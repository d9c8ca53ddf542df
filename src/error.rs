//! Error types for the folding interpreter
//!
//! A `FoldError` aborts one fold attempt. It is always caught at the nearest
//! `safe_execute` boundary and turned into "no value"; it never escapes
//! [`crate::Folder`].

use thiserror::Error;

use crate::state::State;

#[derive(Debug, Error)]
pub enum FoldError {
    #[error("symbol {symbol} is not bound in the current frame")]
    SymbolNotFound { symbol: String },

    #[error("{symbol} does not hold an object")]
    NotAnObject { symbol: String },

    #[error("field {field} is not set")]
    FieldNotFound { field: String },

    #[error("data stack underflow")]
    StackUnderflow,

    #[error("no argument and no default for parameter {parameter}")]
    MissingArgument { parameter: String },

    #[error("no declaration for callee {callee}")]
    UnknownCallee { callee: String },

    #[error("{callee} cannot be evaluated in the current mode")]
    NotFoldable { callee: String },

    #[error("jump target {target} is not on the stack")]
    TargetNotFound { target: String },

    #[error("command limit of {limit} exceeded")]
    CommandLimit { limit: usize },

    #[error("frame limit of {limit} exceeded")]
    StackOverflow { limit: usize },

    #[error("builtin failed: {message}")]
    Builtin { message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    /// A host value was thrown and no try region above the boundary caught it
    #[error("uncaught {value:?}\n{}", format_stack(stack_trace))]
    UncaughtThrow {
        value: State,
        stack_trace: Vec<String>,
    },
}

fn format_stack(stack: &[String]) -> String {
    stack
        .iter()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

impl FoldError {
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        FoldError::SymbolNotFound {
            symbol: symbol.into(),
        }
    }

    pub fn not_an_object(symbol: impl Into<String>) -> Self {
        FoldError::NotAnObject {
            symbol: symbol.into(),
        }
    }

    pub fn field_not_found(field: impl Into<String>) -> Self {
        FoldError::FieldNotFound {
            field: field.into(),
        }
    }

    pub fn missing_argument(parameter: impl Into<String>) -> Self {
        FoldError::MissingArgument {
            parameter: parameter.into(),
        }
    }

    pub fn unknown_callee(callee: impl Into<String>) -> Self {
        FoldError::UnknownCallee {
            callee: callee.into(),
        }
    }

    pub fn not_foldable(callee: impl Into<String>) -> Self {
        FoldError::NotFoldable {
            callee: callee.into(),
        }
    }

    pub fn target_not_found(target: impl Into<String>) -> Self {
        FoldError::TargetNotFound {
            target: target.into(),
        }
    }

    pub fn builtin(message: impl Into<String>) -> Self {
        FoldError::Builtin {
            message: message.into(),
        }
    }

    /// Create an internal error for states the machine should never reach
    pub fn internal_error(message: impl Into<String>) -> Self {
        FoldError::Internal(message.into())
    }

    /// Resource bounds are reported louder than ordinary non-foldable code
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            FoldError::CommandLimit { .. } | FoldError::StackOverflow { .. }
        )
    }

    pub fn thrown_value(&self) -> Option<&State> {
        match self {
            FoldError::UncaughtThrow { value, .. } => Some(value),
            _ => None,
        }
    }
}
