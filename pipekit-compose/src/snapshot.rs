//! Model snapshots
//!
//! A [`ModelSnapshot`] records a model's layout (pipes, component kinds,
//! resolved head configs) and every head parameter, as JSON. Snapshots are
//! how fitted parameters travel between the external trainer and pipekit.

use std::path::Path;

use serde::{Deserialize, Serialize};

use pipekit_core::prelude::*;

use crate::aggregation::Aggregation;
use crate::model::{Model, PipeSpec};
use crate::registry::Registry;

/// One pipe of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeSnapshot {
    pub name: String,
    pub extractor: String,
    pub head: String,
    pub head_config: HeadConfig,
    pub parameters: Vec<Parameter>,
}

/// Serializable model layout and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub model: String,
    pub shape: Shape,
    pub aggregation: Aggregation,
    pub pipes: Vec<PipeSnapshot>,
}

impl ModelSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Pipe specs that rebuild this layout
    pub fn pipe_specs(&self) -> Vec<PipeSpec> {
        self.pipes
            .iter()
            .map(|p| PipeSpec {
                name: p.name.clone(),
                extractor: p.extractor.clone(),
                head: p.head.clone(),
                head_config: None,
                overrides: p.head_config.clone(),
            })
            .collect()
    }

    /// Rebuild the model through `registry` and install the saved parameters
    pub fn rebuild(&self, registry: &Registry) -> Result<Model> {
        let mut model = registry.assemble(&self.model, self.aggregation, &self.pipe_specs(), self.shape)?;
        model.restore(self)?;
        Ok(model)
    }
}
