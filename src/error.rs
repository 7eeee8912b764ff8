//! @ai:module:intent Define error types that abort an evaluation run
//! @ai:module:layer domain
//! @ai:module:public_api EvalError, Result
//! @ai:module:stateless true

use thiserror::Error;

/// @ai:intent Fatal errors for an evaluation run
///
/// Workflow and comparator failures are never represented here: they are
/// folded into failed verdicts so the rest of the suite keeps running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("comparator shape mismatch at {path}: expected {expected_shape}, found {found}")]
    ShapeMismatch {
        path: String,
        expected_shape: &'static str,
        found: String,
    },

    #[error("test case {test_case} has no scorable fields")]
    NoScorableFields { test_case: String },

    #[error("llm comparator at {path} requires an llm configuration")]
    MissingLlmConfig { path: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("evaluation cancelled")]
    Cancelled,
}

impl EvalError {
    /// @ai:intent Whether the run was stopped by the caller rather than misconfigured
    /// @ai:effects pure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EvalError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
