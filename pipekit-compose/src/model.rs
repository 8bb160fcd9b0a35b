//! Pipe and model composition
//!
//! A [`Model`] is an ordered list of [`Pipe`]s plus the [`Aggregation`] its
//! registered definition declares. Models are assembled by
//! [`Registry::build_model`], which resolves every name and checks every
//! width before anything runs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use pipekit_core::prelude::*;

use crate::aggregation::Aggregation;
use crate::registry::{HeadContext, Registry};
use crate::snapshot::{ModelSnapshot, PipeSnapshot};

/// Names the components of one pipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeSpec {
    pub name: String,
    pub extractor: String,
    pub head: String,
    /// Registered config for `head`; `None` starts from an empty record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_config: Option<String>,
    /// Keys layered over the resolved head config
    #[serde(default, rename = "config", skip_serializing_if = "HeadConfig::is_empty")]
    pub overrides: HeadConfig,
}

impl PipeSpec {
    pub fn new(name: impl Into<String>, extractor: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extractor: extractor.into(),
            head: head.into(),
            head_config: None,
            overrides: HeadConfig::new(),
        }
    }

    pub fn with_head_config(mut self, config_name: impl Into<String>) -> Self {
        self.head_config = Some(config_name.into());
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.overrides = self.overrides.with(key, value);
        self
    }
}

/// One named branch: extractor then head
#[derive(Debug)]
pub struct Pipe {
    name: String,
    extractor: Box<dyn Extractor>,
    head: Box<dyn Head>,
    head_config: HeadConfig,
    /// Registered names the components were resolved from
    sources: (String, String),
}

impl Pipe {
    pub fn new(
        name: impl Into<String>,
        extractor: Box<dyn Extractor>,
        head: Box<dyn Head>,
        head_config: HeadConfig,
    ) -> Result<Self> {
        let name = name.into();
        if head.in_dim() != extractor.out_dim() {
            return Err(PipeError::dimension(
                format!("pipe '{}' head input", name),
                extractor.out_dim(),
                head.in_dim(),
            ));
        }
        let sources = (extractor.kind().to_string(), head.kind().to_string());
        Ok(Self {
            name,
            extractor,
            head,
            head_config,
            sources,
        })
    }

    /// Record the registry names this pipe was built from; defaults to the component kinds
    pub fn with_sources(mut self, extractor: impl Into<String>, head: impl Into<String>) -> Self {
        self.sources = (extractor.into(), head.into());
        self
    }

    /// Registered extractor name
    pub fn extractor_name(&self) -> &str {
        &self.sources.0
    }

    /// Registered head name
    pub fn head_name(&self) -> &str {
        &self.sources.1
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    pub fn head(&self) -> &dyn Head {
        self.head.as_ref()
    }

    pub fn head_mut(&mut self) -> &mut dyn Head {
        self.head.as_mut()
    }

    /// Resolved config the head was built from
    pub fn head_config(&self) -> &HeadConfig {
        &self.head_config
    }

    /// `head(extractor(x))`
    pub fn forward(&self, x: &Matrix) -> Result<Matrix> {
        let extracted = self.extractor.transform(x)?;
        self.head.forward(&extracted)
    }
}

/// Ordered pipes plus an aggregation rule
#[derive(Debug)]
pub struct Model {
    name: String,
    shape: Shape,
    aggregation: Aggregation,
    pipes: Vec<Pipe>,
}

impl Model {
    /// Assemble a model from already-built pipes, validating widths
    pub fn new(
        name: impl Into<String>,
        shape: Shape,
        aggregation: Aggregation,
        pipes: Vec<Pipe>,
    ) -> Result<Self> {
        let name = name.into();

        let mut seen = HashSet::new();
        for pipe in &pipes {
            if !seen.insert(pipe.name.as_str()) {
                return Err(PipeError::InvalidPipeline(format!(
                    "duplicate pipe name '{}' in model '{}'",
                    pipe.name, name
                )));
            }
        }

        let widths: Vec<(&str, usize)> = pipes
            .iter()
            .map(|p| (p.name.as_str(), p.head.out_dim()))
            .collect();
        aggregation.validate(shape.out_dim, &widths)?;

        Ok(Self {
            name,
            shape,
            aggregation,
            pipes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn pipe(&self, name: &str) -> Option<&Pipe> {
        self.pipes.iter().find(|p| p.name == name)
    }

    pub fn pipe_mut(&mut self, name: &str) -> Option<&mut Pipe> {
        self.pipes.iter_mut().find(|p| p.name == name)
    }

    /// Per-pipe outputs before aggregation, in pipe order
    pub fn pipe_outputs(&self, x: &Matrix) -> Result<Vec<(&str, Matrix)>> {
        self.check_input(x)?;
        self.pipes
            .iter()
            .map(|p| Ok((p.name.as_str(), p.forward(x)?)))
            .collect()
    }

    /// Run every pipe and aggregate
    pub fn predict(&self, x: &Matrix) -> Result<Matrix> {
        self.check_input(x)?;
        let partials = self
            .pipes
            .iter()
            .map(|p| p.forward(x))
            .collect::<Result<Vec<_>>>()?;
        self.aggregation.combine(partials)
    }

    /// Trainable parameters grouped by pipe
    pub fn parameters(&self) -> Vec<(&str, Vec<Parameter>)> {
        self.pipes
            .iter()
            .map(|p| (p.name.as_str(), p.head.parameters()))
            .collect()
    }

    /// Replace one head parameter of one pipe
    pub fn set_parameter(&mut self, pipe: &str, name: &str, value: Matrix) -> Result<()> {
        let model = self.name.clone();
        let target = self.pipe_mut(pipe).ok_or_else(|| {
            PipeError::InvalidPipeline(format!("model '{}' has no pipe '{}'", model, pipe))
        })?;
        target.head.set_parameter(name, value)
    }

    /// Capture structure and parameters
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            model: self.name.clone(),
            shape: self.shape,
            aggregation: self.aggregation,
            pipes: self
                .pipes
                .iter()
                .map(|p| PipeSnapshot {
                    name: p.name.clone(),
                    extractor: p.extractor_name().to_string(),
                    head: p.head_name().to_string(),
                    head_config: p.head_config.clone(),
                    parameters: p.head.parameters(),
                })
                .collect(),
        }
    }

    /// Install the parameters of a snapshot taken from a model of the same layout
    ///
    /// The snapshot must name this model and its aggregation, hold exactly
    /// this model's pipes and carry every head parameter; nothing is
    /// written unless all of that holds.
    pub fn restore(&mut self, snapshot: &ModelSnapshot) -> Result<()> {
        if snapshot.shape != self.shape {
            return Err(PipeError::ShapeMismatch {
                expected: format!("{}->{}", self.shape.in_dim, self.shape.out_dim),
                actual: format!("{}->{}", snapshot.shape.in_dim, snapshot.shape.out_dim),
            });
        }
        self.check_layout(snapshot)?;

        for pipe in &snapshot.pipes {
            for param in &pipe.parameters {
                self.set_parameter(&pipe.name, &param.name, param.value.clone())?;
            }
        }
        tracing::debug!(model = %self.name, pipes = snapshot.pipes.len(), "restored parameters");
        Ok(())
    }

    fn check_layout(&self, snapshot: &ModelSnapshot) -> Result<()> {
        if snapshot.model != self.name {
            return Err(PipeError::InvalidPipeline(format!(
                "snapshot of model '{}' cannot be restored into '{}'",
                snapshot.model, self.name
            )));
        }
        if snapshot.aggregation != self.aggregation {
            return Err(PipeError::InvalidPipeline(format!(
                "snapshot aggregation {} does not match model '{}' ({})",
                snapshot.aggregation, self.name, self.aggregation
            )));
        }

        let mut seen = HashSet::new();
        for pipe in &snapshot.pipes {
            if !seen.insert(pipe.name.as_str()) {
                return Err(PipeError::InvalidPipeline(format!(
                    "snapshot lists pipe '{}' twice",
                    pipe.name
                )));
            }
            if self.pipe(&pipe.name).is_none() {
                return Err(PipeError::InvalidPipeline(format!(
                    "model '{}' has no pipe '{}'",
                    self.name, pipe.name
                )));
            }
        }

        for pipe in &self.pipes {
            let Some(saved) = snapshot.pipes.iter().find(|p| p.name == pipe.name) else {
                return Err(PipeError::InvalidPipeline(format!(
                    "snapshot is missing pipe '{}'",
                    pipe.name
                )));
            };
            let current = pipe.head.parameters();
            for param in &current {
                let Some(value) = saved.parameters.iter().find(|p| p.name == param.name) else {
                    return Err(PipeError::InvalidPipeline(format!(
                        "snapshot pipe '{}' is missing parameter '{}'",
                        pipe.name, param.name
                    )));
                };
                if value.value.shape() != param.value.shape() {
                    return Err(PipeError::shape(param.value.shape(), value.value.shape()));
                }
            }
            if let Some(extra) = saved
                .parameters
                .iter()
                .find(|p| !current.iter().any(|c| c.name == p.name))
            {
                return Err(PipeError::UnknownParameter {
                    owner: format!("pipe '{}'", pipe.name),
                    name: extra.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_input(&self, x: &Matrix) -> Result<()> {
        if x.cols() != self.shape.in_dim {
            return Err(PipeError::shape((x.rows(), self.shape.in_dim), x.shape()));
        }
        Ok(())
    }
}

impl Predictor for Model {
    fn predict(&self, x: &Matrix) -> Result<Matrix> {
        Model::predict(self, x)
    }
}

impl Registry {
    /// Build a registered model
    ///
    /// The model's definition supplies the aggregation policy; `pipe_specs`
    /// replaces its default pipes unless empty.
    pub fn build_model(&self, model_name: &str, pipe_specs: &[PipeSpec], shape: Shape) -> Result<Model> {
        let definition = self.resolve_model(model_name)?;
        let specs = if pipe_specs.is_empty() {
            definition.pipes.as_slice()
        } else {
            pipe_specs
        };
        self.assemble(model_name, definition.aggregation, specs, shape)
    }

    /// Build a model from explicit pipes and aggregation
    pub fn assemble(
        &self,
        model_name: &str,
        aggregation: Aggregation,
        specs: &[PipeSpec],
        shape: Shape,
    ) -> Result<Model> {
        let mut pipes = Vec::with_capacity(specs.len());
        for spec in specs {
            pipes.push(self.build_pipe(spec, shape)?);
        }
        let model = Model::new(model_name, shape, aggregation, pipes)?;
        tracing::debug!(
            model = %model_name,
            %aggregation,
            pipes = model.pipes.len(),
            in_dim = shape.in_dim,
            out_dim = shape.out_dim,
            "model built"
        );
        Ok(model)
    }

    fn build_pipe(&self, spec: &PipeSpec, shape: Shape) -> Result<Pipe> {
        let extractor_factory = self.resolve_extractor(&spec.extractor)?;
        let head_factory = self.resolve_head(&spec.head)?;
        let base = match &spec.head_config {
            Some(config_name) => self.resolve_head_config(&spec.head, config_name)?.as_ref().clone(),
            None => HeadConfig::new(),
        };
        let config = base.merged(&spec.overrides);

        let extractor = extractor_factory(shape.in_dim)?;
        let out_dim = config.usize_opt("out_dim")?.unwrap_or(shape.out_dim);
        let head = head_factory(&HeadContext {
            in_dim: extractor.out_dim(),
            out_dim,
            config: &config,
        })?;

        if head.out_dim() != out_dim {
            return Err(PipeError::dimension(
                format!("pipe '{}' head output", spec.name),
                out_dim,
                head.out_dim(),
            ));
        }
        Ok(Pipe::new(spec.name.clone(), extractor, head, config)?.with_sources(&spec.extractor, &spec.head))
    }
}
