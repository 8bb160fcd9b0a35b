//! # Error metrics
//!
//! | Metric | Formula |
//! |--------|---------|
//! | `mae` | (1/n) Σ \|y - ŷ\| |
//! | `mse` | (1/n) Σ (y - ŷ)² |
//!
//! `n` counts every element of the target matrix. Lower is better for both.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pipekit_core::Matrix;

use crate::error::{EvalError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Mae,
    Mse,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Mae, Metric::Mse];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Mae => "mae",
            Metric::Mse => "mse",
        }
    }

    /// Score `pred` against `target`; shapes must match
    pub fn compute(&self, pred: &Matrix, target: &Matrix) -> Result<f64> {
        if pred.shape() != target.shape() {
            return Err(EvalError::InvalidInput(format!(
                "predictions are {}x{} but targets are {}x{}",
                pred.rows(),
                pred.cols(),
                target.rows(),
                target.cols()
            )));
        }
        Ok(match self {
            Metric::Mae => mae(pred.data(), target.data()),
            Metric::Mse => mse(pred.data(), target.data()),
        })
    }
}

impl FromStr for Metric {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mae" => Ok(Metric::Mae),
            "mse" => Ok(Metric::Mse),
            other => Err(EvalError::UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mean Absolute Error: (1/n) Σ |y - ŷ|
pub fn mae(pred: &[f64], target: &[f64]) -> f64 {
    if pred.is_empty() {
        return 0.0;
    }
    let sum: f64 = pred.iter().zip(target).map(|(p, t)| (p - t).abs()).sum();
    sum / pred.len() as f64
}

/// Mean Squared Error: (1/n) Σ (y - ŷ)²
pub fn mse(pred: &[f64], target: &[f64]) -> f64 {
    if pred.is_empty() {
        return 0.0;
    }
    let sum: f64 = pred
        .iter()
        .zip(target)
        .map(|(p, t)| {
            let diff = p - t;
            diff * diff
        })
        .sum();
    sum / pred.len() as f64
}
