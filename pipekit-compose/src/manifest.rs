//! Model manifest (pipekit.toml) parser
//!
//! ```toml
//! [model]
//! name = "mixture"
//! in_dim = 5
//! out_dim = 2
//! task_type = "reg"
//! use_simplify_data = true
//!
//! [[pipes]]
//! name = "add"
//! extractor = "identity"
//! head = "mixture"
//! head_config = "add"
//!
//! [pipes.config]
//! init_method = "xavier_uniform"
//! ```
//!
//! Omitting `[[pipes]]` keeps the registered model's default pipes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use pipekit_core::prelude::*;

use crate::api::{MakeConfig, TaskType};
use crate::model::PipeSpec;

/// Parsed model manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model: ModelSection,

    /// Pipe overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipes: Vec<PipeSpec>,
}

/// `[model]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Registered model name
    pub name: String,

    pub in_dim: usize,

    pub out_dim: usize,

    /// Task type (default: regression)
    #[serde(default)]
    pub task_type: TaskType,

    /// Skip input standardization (default: false)
    #[serde(default)]
    pub use_simplify_data: bool,
}

impl ModelManifest {
    /// Parse a manifest from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PipeError::InvalidConfig(format!("failed to parse manifest: {}", e)))
    }

    /// Load manifest from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipeError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    /// Serialize manifest to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PipeError::Serialization(format!("failed to serialize manifest: {}", e)))
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.model.in_dim, self.model.out_dim)
    }

    /// Options for [`crate::api::make`]
    pub fn to_make_config(&self) -> MakeConfig {
        MakeConfig {
            shape: self.shape(),
            task_type: self.model.task_type,
            use_simplify_data: self.model.use_simplify_data,
            pipes: self.pipes.clone(),
        }
    }
}
