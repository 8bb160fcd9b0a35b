//! # Model lifecycle
//!
//! `make` builds an [`UntrainedModel`] from a registered name and a
//! [`MakeConfig`]; `fit` hands it to a [`Trainer`] and returns a
//! [`FittedModel`].
//!
//! ```ignore
//! let registry = Registry::with_builtins();
//! let config = MakeConfig::new(Shape::new(5, 2)).simplify_data(true);
//! let fitted = make(&registry, "mixture", config)?.fit(&trainer, &x, &y)?;
//! let predictions = fitted.predict(&x)?;
//! ```
//!
//! Fitting itself is external: pipekit ships no optimizer, only the
//! [`Trainer`] seam and [`PretrainedParameters`], which installs parameters
//! produced elsewhere.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use pipekit_core::prelude::*;

use crate::model::{Model, PipeSpec};
use crate::registry::Registry;
use crate::snapshot::ModelSnapshot;

/// Loss/target semantics
///
/// Parsing is case-insensitive and accepts the short forms `reg` and `clf`,
/// both from code and from manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TaskType {
    /// Real-valued targets, one column per output
    #[default]
    Regression,
    /// One column of class indices; the model emits one score per class
    Classification,
}

impl FromStr for TaskType {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reg" | "regression" => Ok(TaskType::Regression),
            "clf" | "classification" => Ok(TaskType::Classification),
            other => Err(PipeError::InvalidConfig(format!("unknown task_type '{}'", other))),
        }
    }
}

impl TryFrom<String> for TaskType {
    type Error = PipeError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Regression => f.write_str("regression"),
            TaskType::Classification => f.write_str("classification"),
        }
    }
}

/// Options for [`make`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakeConfig {
    pub shape: Shape,
    #[serde(default)]
    pub task_type: TaskType,
    /// Feed raw inputs instead of standardizing them
    #[serde(default)]
    pub use_simplify_data: bool,
    /// Replaces the model's default pipes when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipes: Vec<PipeSpec>,
}

impl MakeConfig {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            task_type: TaskType::default(),
            use_simplify_data: false,
            pipes: Vec::new(),
        }
    }

    pub fn task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn simplify_data(mut self, enabled: bool) -> Self {
        self.use_simplify_data = enabled;
        self
    }

    pub fn with_pipe(mut self, pipe: PipeSpec) -> Self {
        self.pipes.push(pipe);
        self
    }
}

/// Build a registered model
pub fn make(registry: &Registry, model_name: &str, config: MakeConfig) -> Result<UntrainedModel> {
    let model = registry.build_model(model_name, &config.pipes, config.shape)?;
    tracing::info!(
        model = %model_name,
        task_type = %config.task_type,
        simplify = config.use_simplify_data,
        "model created"
    );
    Ok(UntrainedModel { model, config })
}

/// External fitting procedure
pub trait Trainer {
    /// Fit `model` in place on already-preprocessed inputs
    fn fit(&self, model: &mut Model, x: &Matrix, y: &Matrix) -> Result<()>;
}

/// Trainer that installs parameters from a snapshot instead of optimizing
#[derive(Debug, Clone)]
pub struct PretrainedParameters {
    snapshot: ModelSnapshot,
}

impl PretrainedParameters {
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ModelSnapshot::load(path)?))
    }
}

impl Trainer for PretrainedParameters {
    fn fit(&self, model: &mut Model, _x: &Matrix, _y: &Matrix) -> Result<()> {
        model.restore(&self.snapshot)
    }
}

/// Per-column standardization fitted on training inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Normalizer {
    /// Fit on `x`; constant columns keep unit scale
    pub fn fit(x: &Matrix) -> Self {
        let stds = x
            .column_stds()
            .into_iter()
            .map(|s| if s > f64::EPSILON { s } else { 1.0 })
            .collect();
        Self {
            means: x.column_means(),
            stds,
        }
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn apply(&self, x: &Matrix) -> Result<Matrix> {
        if x.cols() != self.means.len() {
            return Err(PipeError::shape((x.rows(), self.means.len()), x.shape()));
        }
        let mut out = x.clone();
        for r in 0..x.rows() {
            for c in 0..x.cols() {
                out.set(r, c, (x.get(r, c) - self.means[c]) / self.stds[c]);
            }
        }
        Ok(out)
    }
}

/// Built but not yet fitted model
#[derive(Debug)]
pub struct UntrainedModel {
    model: Model,
    config: MakeConfig,
}

impl UntrainedModel {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn config(&self) -> &MakeConfig {
        &self.config
    }

    /// Validate data, fit the normalizer if enabled, run `trainer`
    pub fn fit<T: Trainer + ?Sized>(mut self, trainer: &T, x: &Matrix, y: &Matrix) -> Result<FittedModel> {
        validate_training_data(&self.config, x, y)?;

        let normalizer = if self.config.use_simplify_data {
            None
        } else {
            Some(Normalizer::fit(x))
        };
        let x_fit = match &normalizer {
            Some(n) => n.apply(x)?,
            None => x.clone(),
        };

        trainer.fit(&mut self.model, &x_fit, y)?;
        tracing::info!(model = %self.model.name(), samples = x.rows(), "model fitted");

        Ok(FittedModel {
            model: self.model,
            config: self.config,
            normalizer,
        })
    }

    /// Install parameters fitted elsewhere on raw inputs
    ///
    /// A snapshot carries no normalizer, so this needs `use_simplify_data`;
    /// a model fitted on standardized inputs is reloaded with
    /// [`FittedModel::load`] instead.
    pub fn install(mut self, snapshot: &ModelSnapshot) -> Result<FittedModel> {
        if !self.config.use_simplify_data {
            return Err(PipeError::InvalidConfig(format!(
                "model '{}' standardizes its inputs; installing a bare snapshot needs use_simplify_data = true, \
                 load the saved fitted model instead",
                self.model.name()
            )));
        }
        self.model.restore(snapshot)?;
        tracing::info!(model = %self.model.name(), "parameters installed");
        Ok(FittedModel {
            model: self.model,
            config: self.config,
            normalizer: None,
        })
    }
}

fn validate_training_data(config: &MakeConfig, x: &Matrix, y: &Matrix) -> Result<()> {
    if x.rows() == 0 {
        return Err(PipeError::InvalidInput("training data is empty".into()));
    }
    if x.rows() != y.rows() {
        return Err(PipeError::InvalidInput(format!(
            "x has {} rows but y has {}",
            x.rows(),
            y.rows()
        )));
    }
    if x.cols() != config.shape.in_dim {
        return Err(PipeError::shape((x.rows(), config.shape.in_dim), x.shape()));
    }

    match config.task_type {
        TaskType::Regression => {
            if y.cols() != config.shape.out_dim {
                return Err(PipeError::shape((y.rows(), config.shape.out_dim), y.shape()));
            }
        }
        TaskType::Classification => {
            if y.cols() != 1 {
                return Err(PipeError::shape((y.rows(), 1), y.shape()));
            }
            let classes = config.shape.out_dim as f64;
            if let Some(bad) = y
                .data()
                .iter()
                .find(|&&label| label < 0.0 || label.fract() != 0.0 || label >= classes)
            {
                return Err(PipeError::InvalidInput(format!(
                    "label {} is not a class index below {}",
                    bad, config.shape.out_dim
                )));
            }
        }
    }
    Ok(())
}

/// On-disk form of a [`FittedModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SavedModel {
    task_type: TaskType,
    use_simplify_data: bool,
    normalizer: Option<Normalizer>,
    model: ModelSnapshot,
}

/// Fitted model handle
#[derive(Debug)]
pub struct FittedModel {
    model: Model,
    config: MakeConfig,
    normalizer: Option<Normalizer>,
}

impl FittedModel {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &MakeConfig {
        &self.config
    }

    pub fn normalizer(&self) -> Option<&Normalizer> {
        self.normalizer.as_ref()
    }

    /// Learned parameters grouped by pipe
    pub fn parameters(&self) -> Vec<(&str, Vec<Parameter>)> {
        self.model.parameters()
    }

    pub fn predict(&self, x: &Matrix) -> Result<Matrix> {
        match &self.normalizer {
            Some(n) => self.model.predict(&n.apply(x)?),
            None => self.model.predict(x),
        }
    }

    /// Highest-scoring class per row
    pub fn predict_classes(&self, x: &Matrix) -> Result<Vec<usize>> {
        if self.config.task_type != TaskType::Classification {
            return Err(PipeError::InvalidConfig(
                "predict_classes needs a classification model".into(),
            ));
        }
        Ok(self.predict(x)?.argmax_rows())
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        self.model.snapshot()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let saved = SavedModel {
            task_type: self.config.task_type,
            use_simplify_data: self.config.use_simplify_data,
            normalizer: self.normalizer.clone(),
            model: self.model.snapshot(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&saved)?)?;
        tracing::info!(model = %self.model.name(), path = %path.display(), "model saved");
        Ok(())
    }

    pub fn load(registry: &Registry, path: &Path) -> Result<Self> {
        let saved: SavedModel = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        let model = saved.model.rebuild(registry)?;
        let config = MakeConfig {
            shape: saved.model.shape,
            task_type: saved.task_type,
            use_simplify_data: saved.use_simplify_data,
            pipes: saved.model.pipe_specs(),
        };
        Ok(Self {
            model,
            config,
            normalizer: saved.normalizer,
        })
    }
}

impl Predictor for FittedModel {
    fn predict(&self, x: &Matrix) -> Result<Matrix> {
        FittedModel::predict(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes fixed weights, like a trainer that already converged
    struct FixedWeights(Vec<f64>);

    impl Trainer for FixedWeights {
        fn fit(&self, model: &mut Model, _x: &Matrix, _y: &Matrix) -> Result<()> {
            let weight = Matrix::row_vector(self.0.clone());
            model.set_parameter("linear", "weight", weight)
        }
    }

    fn data() -> (Matrix, Matrix) {
        let x = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        let y = Matrix::column(vec![3.0, 7.0, 11.0]);
        (x, y)
    }

    #[test]
    fn test_task_type_parse() {
        assert_eq!("reg".parse::<TaskType>().unwrap(), TaskType::Regression);
        assert_eq!("Classification".parse::<TaskType>().unwrap(), TaskType::Classification);
        assert!("ranking".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_simplified_fit_keeps_raw_inputs() {
        let registry = Registry::with_builtins();
        let (x, y) = data();
        let config = MakeConfig::new(Shape::new(2, 1)).simplify_data(true);
        let fitted = make(&registry, "linear", config)
            .unwrap()
            .fit(&FixedWeights(vec![1.0, 1.0]), &x, &y)
            .unwrap();

        assert!(fitted.normalizer().is_none());
        assert_eq!(fitted.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_default_fit_standardizes() {
        let registry = Registry::with_builtins();
        let (x, y) = data();
        let fitted = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)))
            .unwrap()
            .fit(&FixedWeights(vec![1.0, 0.0]), &x, &y)
            .unwrap();

        let normalizer = fitted.normalizer().unwrap();
        assert_eq!(normalizer.means(), &[3.0, 4.0]);
        // standardized first column of [1, 3, 5]
        let pred = fitted.predict(&x).unwrap();
        let std = (8.0f64 / 3.0).sqrt();
        assert!((pred.get(0, 0) + 2.0 / std).abs() < 1e-12);
        assert!(pred.get(1, 0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_validates_shapes() {
        let registry = Registry::with_builtins();
        let (x, _) = data();
        let untrained = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1))).unwrap();
        let short_y = Matrix::column(vec![1.0, 2.0]);
        assert!(untrained.fit(&FixedWeights(vec![1.0, 1.0]), &x, &short_y).is_err());
    }

    #[test]
    fn test_classification_labels() {
        let registry = Registry::with_builtins();
        let x = Matrix::from_rows(&[[1.0, 0.0], [0.0, 1.0]]).unwrap();
        let config = MakeConfig::new(Shape::new(2, 2))
            .task_type(TaskType::Classification)
            .simplify_data(true);

        let bad = Matrix::column(vec![0.0, 2.0]);
        let untrained = make(&registry, "linear", config.clone()).unwrap();
        assert!(untrained.fit(&FixedWeights(vec![]), &x, &bad).is_err());

        struct Eye;
        impl Trainer for Eye {
            fn fit(&self, model: &mut Model, _x: &Matrix, _y: &Matrix) -> Result<()> {
                let eye = Matrix::from_rows(&[[1.0, 0.0], [0.0, 1.0]])?;
                model.set_parameter("linear", "weight", eye)
            }
        }
        let labels = Matrix::column(vec![0.0, 1.0]);
        let fitted = make(&registry, "linear", config).unwrap().fit(&Eye, &x, &labels).unwrap();
        assert_eq!(fitted.predict_classes(&x).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_predict_classes_needs_classification() {
        let registry = Registry::with_builtins();
        let (x, y) = data();
        let fitted = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)).simplify_data(true))
            .unwrap()
            .fit(&FixedWeights(vec![1.0, 1.0]), &x, &y)
            .unwrap();
        assert!(fitted.predict_classes(&x).is_err());
    }

    #[test]
    fn test_pretrained_parameters_trainer() {
        let registry = Registry::with_builtins();
        let (x, y) = data();
        let first = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)).simplify_data(true))
            .unwrap()
            .fit(&FixedWeights(vec![1.0, 1.0]), &x, &y)
            .unwrap();

        let trainer = PretrainedParameters::new(first.snapshot());
        let second = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)).simplify_data(true))
            .unwrap()
            .fit(&trainer, &x, &y)
            .unwrap();
        assert_eq!(second.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_save_load_keeps_normalizer() {
        let registry = Registry::with_builtins();
        let (x, y) = data();
        let fitted = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)))
            .unwrap()
            .fit(&FixedWeights(vec![0.5, -1.0]), &x, &y)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fitted.json");
        fitted.save(&path).unwrap();

        let loaded = FittedModel::load(&registry, &path).unwrap();
        assert_eq!(loaded.normalizer(), fitted.normalizer());
        assert_eq!(loaded.predict(&x).unwrap(), fitted.predict(&x).unwrap());
    }

    #[test]
    fn test_install_needs_simplified_inputs() {
        let registry = Registry::with_builtins();
        let (x, y) = data();
        let fitted = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)))
            .unwrap()
            .fit(&FixedWeights(vec![1.0, 0.0]), &x, &y)
            .unwrap();

        let standardized = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1))).unwrap();
        assert!(matches!(
            standardized.install(&fitted.snapshot()),
            Err(PipeError::InvalidConfig(_))
        ));

        let raw = make(&registry, "linear", MakeConfig::new(Shape::new(2, 1)).simplify_data(true)).unwrap();
        assert!(raw.install(&fitted.snapshot()).unwrap().normalizer().is_none());
    }

    #[test]
    fn test_normalizer_constant_column() {
        let x = Matrix::from_rows(&[[2.0, 1.0], [2.0, 3.0]]).unwrap();
        let n = Normalizer::fit(&x);
        assert_eq!(n.stds(), &[1.0, 1.0]);
        let z = n.apply(&x).unwrap();
        assert_eq!(z.data(), &[0.0, -1.0, 0.0, 1.0]);
        assert!(n.apply(&Matrix::zeros(1, 3)).is_err());
    }
}
