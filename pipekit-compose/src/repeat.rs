//! Repeated fitting
//!
//! [`repeat_with`] fits every listed model `num_repeat` times and collects
//! the fitted handles per identifier. Repeat `i` offsets every pipe's `seed`
//! by `i`, so seeded initializations differ between repeats.
//!
//! ```ignore
//! let config = RepeatConfig::new(["linear", "fcnn"], MakeConfig::new(shape)).num_repeat(5);
//! let result = repeat_with(&registry, &config, &trainer, &x, &y)?;
//! let averaged = result.ensemble("fcnn").unwrap().predict(&x)?;
//! ```

use std::collections::HashSet;

use pipekit_core::prelude::*;

use crate::api::{make, FittedModel, MakeConfig, Trainer};
use crate::model::PipeSpec;
use crate::registry::Registry;

/// What [`repeat_with`] fits
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatConfig {
    pub models: Vec<String>,
    /// Result keys, one per model; defaults to the model names
    pub identifiers: Option<Vec<String>>,
    pub num_repeat: usize,
    pub make: MakeConfig,
}

impl RepeatConfig {
    pub fn new<I, S>(models: I, make: MakeConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            identifiers: None,
            num_repeat: 5,
            make,
        }
    }

    pub fn num_repeat(mut self, num_repeat: usize) -> Self {
        self.num_repeat = num_repeat;
        self
    }

    pub fn identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers = Some(identifiers.into_iter().map(Into::into).collect());
        self
    }

    fn resolved_identifiers(&self) -> Result<Vec<String>> {
        let identifiers = self.identifiers.clone().unwrap_or_else(|| self.models.clone());
        if identifiers.len() != self.models.len() {
            return Err(PipeError::InvalidConfig(format!(
                "{} identifiers for {} models",
                identifiers.len(),
                self.models.len()
            )));
        }
        let mut seen = HashSet::new();
        for id in &identifiers {
            if !seen.insert(id.as_str()) {
                return Err(PipeError::InvalidConfig(format!("duplicate identifier '{}'", id)));
            }
        }
        Ok(identifiers)
    }
}

/// Fitted models per identifier, in repeat order
#[derive(Debug)]
pub struct RepeatResult {
    fitted: Vec<(String, Vec<FittedModel>)>,
}

impl RepeatResult {
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.fitted.iter().map(|(id, _)| id.as_str())
    }

    pub fn get(&self, identifier: &str) -> Option<&[FittedModel]> {
        self.fitted
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, models)| models.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FittedModel])> {
        self.fitted.iter().map(|(id, models)| (id.as_str(), models.as_slice()))
    }

    /// Averaging predictor over every repeat of `identifier`
    pub fn ensemble(&self, identifier: &str) -> Option<Ensemble<'_>> {
        self.get(identifier).map(|models| Ensemble { models })
    }

    pub fn into_inner(self) -> Vec<(String, Vec<FittedModel>)> {
        self.fitted
    }
}

/// Mean prediction of several fitted models
#[derive(Debug, Clone, Copy)]
pub struct Ensemble<'a> {
    models: &'a [FittedModel],
}

impl Predictor for Ensemble<'_> {
    fn predict(&self, x: &Matrix) -> Result<Matrix> {
        let Some((first, rest)) = self.models.split_first() else {
            return Err(PipeError::InvalidPipeline("empty ensemble".into()));
        };
        let mut total = first.predict(x)?;
        for model in rest {
            total.add_assign(&model.predict(x)?)?;
        }
        let count = self.models.len() as f64;
        Ok(total.map(|v| v / count))
    }
}

/// Fit each model of `config` `num_repeat` times with `trainer`
pub fn repeat_with<T: Trainer + ?Sized>(
    registry: &Registry,
    config: &RepeatConfig,
    trainer: &T,
    x: &Matrix,
    y: &Matrix,
) -> Result<RepeatResult> {
    if config.num_repeat == 0 {
        return Err(PipeError::InvalidConfig("num_repeat must be positive".into()));
    }
    if config.models.is_empty() {
        return Err(PipeError::InvalidConfig("no models to repeat".into()));
    }
    let identifiers = config.resolved_identifiers()?;

    let mut fitted = Vec::with_capacity(config.models.len());
    for (model_name, identifier) in config.models.iter().zip(identifiers) {
        let base_pipes = if config.make.pipes.is_empty() {
            registry.resolve_model(model_name)?.pipes.clone()
        } else {
            config.make.pipes.clone()
        };

        let mut repeats = Vec::with_capacity(config.num_repeat);
        for i in 0..config.num_repeat {
            let make_config = MakeConfig {
                pipes: reseeded(&base_pipes, i as u64)?,
                ..config.make.clone()
            };
            repeats.push(make(registry, model_name, make_config)?.fit(trainer, x, y)?);
            tracing::debug!(model = %model_name, identifier = %identifier, repeat = i, "repeat fitted");
        }
        tracing::info!(model = %model_name, repeats = config.num_repeat, "repeats finished");
        fitted.push((identifier, repeats));
    }
    Ok(RepeatResult { fitted })
}

fn reseeded(pipes: &[PipeSpec], offset: u64) -> Result<Vec<PipeSpec>> {
    pipes
        .iter()
        .map(|spec| {
            let seed = spec.overrides.u64_or("seed", 0)?.wrapping_add(offset);
            Ok(spec.clone().with_override("seed", seed))
        })
        .collect()
}
