//! Fold configuration

use serde::{Deserialize, Serialize};

use crate::declarations::FunctionDecl;
use crate::error::FoldError;

/// Which callees the folder may evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Only intrinsic operations on primitives
    OnlyBuiltins,
    /// Intrinsics plus every declaration annotated as foldable
    #[default]
    WithAnnotations,
}

impl EvaluationMode {
    pub fn can_evaluate_function(self, function: &FunctionDecl) -> bool {
        match self {
            EvaluationMode::OnlyBuiltins => function.is_intrinsic(),
            EvaluationMode::WithAnnotations => function.is_intrinsic() || function.foldable,
        }
    }

    /// Closures are user code, so they need the annotation-aware mode.
    pub fn can_invoke_closures(self) -> bool {
        self == EvaluationMode::WithAnnotations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldConfig {
    pub mode: EvaluationMode,
    /// Instructions one fold attempt may execute
    pub max_commands: usize,
    /// Live frames one fold attempt may create
    pub max_frames: usize,
}

impl Default for FoldConfig {
    fn default() -> Self {
        FoldConfig {
            mode: EvaluationMode::default(),
            max_commands: 1_000_000,
            max_frames: 10_000,
        }
    }
}

impl FoldConfig {
    pub fn with_mode(mode: EvaluationMode) -> Self {
        FoldConfig {
            mode,
            ..FoldConfig::default()
        }
    }

    /// Parse a configuration; missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self, FoldError> {
        serde_json::from_str(source)
            .map_err(|e| FoldError::internal_error(format!("invalid fold config: {}", e)))
    }
}
