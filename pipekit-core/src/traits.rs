//! # Capability traits
//!
//! Any type that declares an output width and transforms a matrix is an
//! [`Extractor`]; any type that maps extracted features to (part of) the
//! prediction is a [`Head`]. Concrete implementations live in
//! `pipekit-compose`.
//!
//! | Trait | Role |
//! |:------|:-----|
//! | [`Extractor`] | raw features -> intermediate representation |
//! | [`Head`] | intermediate representation -> prediction columns |
//! | [`Predictor`] | anything that can be scored against targets |

use std::fmt::Debug;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::types::Parameter;

/// Feature extractor
pub trait Extractor: Debug + Send + Sync {
    /// Registered kind, e.g. `"identity"`
    fn kind(&self) -> &str;

    /// Width of the extracted representation
    fn out_dim(&self) -> usize;

    /// Transform a `(samples, in_dim)` matrix into `(samples, out_dim)`
    fn transform(&self, input: &Matrix) -> Result<Matrix>;
}

/// Prediction head
pub trait Head: Debug + Send + Sync {
    /// Registered kind, e.g. `"linear"`
    fn kind(&self) -> &str;

    fn in_dim(&self) -> usize;

    fn out_dim(&self) -> usize;

    /// Forward pass: `(samples, in_dim)` -> `(samples, out_dim)`
    fn forward(&self, net: &Matrix) -> Result<Matrix>;

    /// Trainable parameters, in a stable order
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    /// Replace one named parameter; shape must match the current value
    fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()>;
}

/// Something that produces predictions for a feature matrix
pub trait Predictor {
    fn predict(&self, x: &Matrix) -> Result<Matrix>;
}

impl<P: Predictor + ?Sized> Predictor for &P {
    fn predict(&self, x: &Matrix) -> Result<Matrix> {
        (**self).predict(x)
    }
}
