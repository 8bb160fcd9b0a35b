//! Aggregation of pipe outputs
//!
//! Each registered model declares how its pipes' partial outputs become the
//! prediction. Widths are checked once, when the model is built.

use std::fmt;

use serde::{Deserialize, Serialize};

use pipekit_core::prelude::*;

/// Per-model strategy for combining pipe outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Exactly one pipe; its output is the prediction
    PassThrough,
    /// Every head emits the full target width (non-owned slots zeroed); outputs are summed
    Sum,
    /// Head widths add up to the target width; outputs are concatenated in pipe order
    Concat,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::PassThrough => "pass_through",
            Aggregation::Sum => "sum",
            Aggregation::Concat => "concat",
        }
    }

    /// Check head output widths against the model target width
    ///
    /// `widths` holds `(pipe name, head out_dim)` in pipe order.
    pub fn validate(&self, out_dim: usize, widths: &[(&str, usize)]) -> Result<()> {
        if widths.is_empty() {
            return Err(PipeError::InvalidPipeline(
                "model must have at least one pipe".into(),
            ));
        }

        match self {
            Aggregation::PassThrough => {
                if widths.len() != 1 {
                    return Err(PipeError::InvalidPipeline(format!(
                        "pass-through model takes exactly one pipe, got {}",
                        widths.len()
                    )));
                }
                check_full_width(out_dim, widths)
            }
            Aggregation::Sum => check_full_width(out_dim, widths),
            Aggregation::Concat => {
                let total: usize = widths.iter().map(|(_, w)| w).sum();
                if total != out_dim {
                    return Err(PipeError::dimension(
                        "concatenated head outputs",
                        out_dim,
                        total,
                    ));
                }
                Ok(())
            }
        }
    }

    /// Combine partial outputs, given in pipe order
    pub fn combine(&self, partials: Vec<Matrix>) -> Result<Matrix> {
        match self {
            Aggregation::PassThrough => partials
                .into_iter()
                .next()
                .ok_or_else(|| PipeError::InvalidPipeline("no pipe output to pass through".into())),
            Aggregation::Sum => {
                let mut iter = partials.into_iter();
                let mut total = iter
                    .next()
                    .ok_or_else(|| PipeError::InvalidPipeline("no pipe outputs to sum".into()))?;
                for partial in iter {
                    total.add_assign(&partial)?;
                }
                Ok(total)
            }
            Aggregation::Concat => Matrix::hstack(&partials),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_full_width(out_dim: usize, widths: &[(&str, usize)]) -> Result<()> {
    for (pipe, width) in widths {
        if *width != out_dim {
            return Err(PipeError::dimension(
                format!("pipe '{}' head output", pipe),
                out_dim,
                *width,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_single_pipe() {
        assert!(Aggregation::PassThrough.validate(1, &[("linear", 1)]).is_ok());
        let err = Aggregation::PassThrough
            .validate(1, &[("a", 1), ("b", 1)])
            .unwrap_err();
        assert!(matches!(err, PipeError::InvalidPipeline(_)));
    }

    #[test]
    fn test_sum_requires_full_width() {
        assert!(Aggregation::Sum.validate(2, &[("add", 2), ("prod", 2)]).is_ok());
        let err = Aggregation::Sum.validate(2, &[("add", 2), ("prod", 1)]).unwrap_err();
        assert_eq!(err, PipeError::dimension("pipe 'prod' head output", 2, 1));
    }

    #[test]
    fn test_concat_widths_add_up() {
        assert!(Aggregation::Concat.validate(3, &[("a", 1), ("b", 2)]).is_ok());
        assert!(matches!(
            Aggregation::Concat.validate(3, &[("a", 1), ("b", 1)]),
            Err(PipeError::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_empty_pipes_rejected() {
        for agg in [Aggregation::PassThrough, Aggregation::Sum, Aggregation::Concat] {
            assert!(agg.validate(1, &[]).is_err());
        }
    }

    #[test]
    fn test_combine_sum_and_concat() {
        let a = Matrix::from_rows(&[[1.0, 0.0]]).unwrap();
        let b = Matrix::from_rows(&[[0.0, 5.0]]).unwrap();

        let summed = Aggregation::Sum.combine(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(summed.data(), &[1.0, 5.0]);

        let joined = Aggregation::Concat.combine(vec![a, b]).unwrap();
        assert_eq!(joined.data(), &[1.0, 0.0, 0.0, 5.0]);
    }
}
