//! Error types for pipekit

use thiserror::Error;

use crate::types::Category;

/// Result type for pipekit operations
pub type Result<T> = std::result::Result<T, PipeError>;

/// pipekit error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipeError {
    /// Extractor, head, head config or model name not present in the registry
    #[error("Unresolved component: no {category} registered as '{name}'")]
    UnresolvedComponent { category: Category, name: String },

    /// Declared widths disagree at construction time
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown parameter '{name}' on {owner}")]
    UnknownParameter { owner: String, name: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl PipeError {
    /// Shorthand for an unresolved lookup
    pub fn unresolved(category: Category, name: impl Into<String>) -> Self {
        PipeError::UnresolvedComponent {
            category,
            name: name.into(),
        }
    }

    /// Shorthand for a width disagreement
    pub fn dimension(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        PipeError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Shorthand for a matrix shape disagreement
    pub fn shape(expected: (usize, usize), actual: (usize, usize)) -> Self {
        PipeError::ShapeMismatch {
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }
}

impl From<std::io::Error> for PipeError {
    fn from(err: std::io::Error) -> Self {
        PipeError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PipeError {
    fn from(err: serde_json::Error) -> Self {
        PipeError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_display() {
        let err = PipeError::unresolved(Category::Head, "mystery");
        let msg = err.to_string();
        assert!(msg.contains("head"));
        assert!(msg.contains("'mystery'"));
    }

    #[test]
    fn test_dimension_display() {
        let err = PipeError::dimension("pipe 'add' head output", 2, 3);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in pipe 'add' head output: expected 2, got 3"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PipeError = io.into();
        assert!(matches!(err, PipeError::Io(_)));
    }
}
