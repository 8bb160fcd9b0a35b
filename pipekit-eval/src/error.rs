//! Error types for pipekit-eval

use thiserror::Error;

use pipekit_core::PipeError;

/// Result type for evaluation
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Prediction failed: {0}")]
    Pipe(#[from] PipeError),

    #[error("Duplicate pipeline name '{0}'")]
    DuplicateName(String),

    #[error("No pipelines to evaluate")]
    NoPipelines,

    #[error("Unknown metric '{0}' (expected 'mae' or 'mse')")]
    UnknownMetric(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
