//! # pipekit-compose
//!
//! Registry-driven model composition. Components are registered by name
//! under a [`Category`]; models are built by resolving those names into
//! pipes and checking every width before the first prediction.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                      Registry                          │
//! │   extractors | heads | head configs | models           │
//! └──────────────────────────┬─────────────────────────────┘
//!                            │ build_model / make
//! ┌──────────────────────────▼─────────────────────────────┐
//! │                        Model                           │
//! │   pipe: extractor ─► head ─┐                           │
//! │   pipe: extractor ─► head ─┼─► aggregation             │
//! │   pipe: extractor ─► head ─┘                           │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pipekit_compose::prelude::*;
//!
//! let registry = Registry::with_builtins();
//! let untrained = make(&registry, "mixture", MakeConfig::new(Shape::new(5, 2)))?;
//! let fitted = untrained.fit(&PretrainedParameters::from_file(path)?, &x, &y)?;
//! let predictions = fitted.predict(&x)?;
//! ```

pub mod aggregation;
pub mod api;
pub mod builtin;
pub mod extractors;
pub mod heads;
pub mod manifest;
pub mod model;
pub mod registry;
pub mod repeat;
pub mod snapshot;

pub use aggregation::Aggregation;
pub use api::{
    make, FittedModel, MakeConfig, Normalizer, PretrainedParameters, TaskType, Trainer,
    UntrainedModel,
};
pub use builtin::register_builtins;
pub use extractors::{IdentityExtractor, ProductExtractor};
pub use heads::{
    Activation, BatchNorm, DndfHead, InitMethod, LinearHead, LinearInit, Mapping, MappingConfig,
    MixtureHead, MlpHead,
};
pub use manifest::{ModelManifest, ModelSection};
pub use model::{Model, Pipe, PipeSpec};
pub use registry::{
    Entry, ExtractorFactory, HeadContext, HeadFactory, ModelDefinition, RegistrationConflict,
    Registry,
};
pub use repeat::{repeat_with, Ensemble, RepeatConfig, RepeatResult};
pub use snapshot::{ModelSnapshot, PipeSnapshot};

// Re-export core types
pub use pipekit_core::prelude::*;

/// Prelude module with common re-exports
pub mod prelude {
    pub use crate::aggregation::Aggregation;
    pub use crate::api::{make, FittedModel, MakeConfig, PretrainedParameters, TaskType, Trainer};
    pub use crate::manifest::ModelManifest;
    pub use crate::model::{Model, PipeSpec};
    pub use crate::registry::{ModelDefinition, Registry};
    pub use crate::repeat::{repeat_with, RepeatConfig};
    pub use crate::snapshot::ModelSnapshot;
    pub use pipekit_core::prelude::*;
}
