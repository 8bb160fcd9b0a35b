//! # pipekit-core
//!
//! Building blocks shared by every pipekit crate:
//!
//! - **matrix**: dense row-major `f64` matrices
//! - **traits**: [`Extractor`], [`Head`] and [`Predictor`] capabilities
//! - **config**: immutable [`HeadConfig`] records
//! - **types**: registry [`Category`], model [`Shape`], named [`Parameter`]
//! - **error**: [`PipeError`] and the crate [`Result`]
//!
//! ```text
//! raw X ──► Extractor ──► Head ──► partial ─┐
//! raw X ──► Extractor ──► Head ──► partial ─┼─► aggregation ──► prediction
//! raw X ──► Extractor ──► Head ──► partial ─┘
//! ```

pub mod config;
pub mod error;
pub mod matrix;
pub mod traits;
pub mod types;

pub use config::HeadConfig;
pub use error::{PipeError, Result};
pub use matrix::Matrix;
pub use traits::{Extractor, Head, Predictor};
pub use types::{Category, Parameter, Shape};

/// Prelude module with common re-exports
pub mod prelude {
    pub use crate::config::HeadConfig;
    pub use crate::error::{PipeError, Result};
    pub use crate::matrix::Matrix;
    pub use crate::traits::{Extractor, Head, Predictor};
    pub use crate::types::{Category, Parameter, Shape};
}
