//! # pipekit-eval
//!
//! Error metrics and ranked comparison of fitted models.
//!
//! | Item | Role |
//! |:-----|:-----|
//! | [`Metric`] | `mae` / `mse`, lower is better |
//! | [`evaluate`] | score named [`Predictor`]s on one dataset |
//! | [`ComparisonReport`] | per-metric ranking plus a plain-text table |

pub mod compare;
pub mod error;
pub mod metrics;

pub use compare::{evaluate, ComparisonReport, ModelScores};
pub use error::{EvalError, Result};
pub use metrics::{mae, mse, Metric};

pub use pipekit_core::Predictor;
