//! # Built-in heads
//!
//! | Head | Output |
//! |------|--------|
//! | [`LinearHead`] | `X · Wᵗ + b` |
//! | [`MixtureHead`] | scalar linear output placed in slot `target_dim`, other slots zero |
//! | [`MlpHead`] | hidden [`Mapping`]s (linear, batch norm, activation), then a final linear layer |
//! | [`DndfHead`] | soft decision forest: routing probabilities times leaf values |
//!
//! ## Configuration keys
//!
//! | Key | Type | Default | Used by |
//! |-----|------|---------|---------|
//! | `bias` | bool | `true` (`!batch_norm` in a mapping) | all |
//! | `init_method` | `"zeros"` \| `"xavier_uniform"` | `"xavier_uniform"` | all |
//! | `bias_fill` | f64 | `0.0` | all |
//! | `seed` | u64 | `0` | `xavier_uniform` |
//! | `target_dim` | usize | required | mixture |
//! | `num_units` | [usize] | `[16]` | mlp |
//! | `mapping_configs` | table or [table] | `{}` | mlp |
//! | `final_mapping_config` | table | `{}` | mlp |
//! | `batch_norm` | bool | `true` | mlp mappings |
//! | `activation` | `"relu"` \| `"tanh"` \| `"sigmoid"` \| `"none"` | `"relu"` | mlp mappings |
//! | `dropout` | f64 in `[0, 1]` | `0.5` | mlp mappings |
//! | `num_tree` | usize | `10` | dndf |
//! | `tree_depth` | usize | `4` | dndf |
//! | `is_regression` | bool | `out_dim == 1` | dndf |
//! | `tree_proj_config` | table | `{}` | dndf |
//!
//! Top-level keys are defaults for the nested tables, so `seed` or
//! `init_method` set once reach every layer.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use pipekit_core::prelude::*;

/// Weight initialization scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMethod {
    Zeros,
    /// Uniform in `±sqrt(6 / (in + out))`
    XavierUniform,
}

impl FromStr for InitMethod {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zeros" => Ok(InitMethod::Zeros),
            "xavier_uniform" => Ok(InitMethod::XavierUniform),
            other => Err(PipeError::InvalidConfig(format!(
                "unknown init_method '{}' (expected 'zeros' or 'xavier_uniform')",
                other
            ))),
        }
    }
}

/// Initialization settings read from a head config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearInit {
    pub bias: bool,
    pub method: InitMethod,
    pub bias_fill: f64,
    pub seed: u64,
}

impl Default for LinearInit {
    fn default() -> Self {
        Self {
            bias: true,
            method: InitMethod::XavierUniform,
            bias_fill: 0.0,
            seed: 0,
        }
    }
}

impl LinearInit {
    pub fn from_config(config: &HeadConfig) -> Result<Self> {
        Ok(Self {
            bias: config.bool_or("bias", true)?,
            method: config.str_or("init_method", "xavier_uniform")?.parse()?,
            bias_fill: config.f64_or("bias_fill", 0.0)?,
            seed: config.u64_or("seed", 0)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINEAR
// ═══════════════════════════════════════════════════════════════════════════════

/// Fully connected head: `output = X · Wᵗ + b`
///
/// `W` is `(out_dim, in_dim)`, `b` is `(1, out_dim)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearHead {
    in_dim: usize,
    out_dim: usize,
    weight: Matrix,
    bias: Option<Matrix>,
}

impl LinearHead {
    /// Zero-initialized head with bias
    pub fn new(in_dim: usize, out_dim: usize) -> Self {
        Self {
            in_dim,
            out_dim,
            weight: Matrix::zeros(out_dim, in_dim),
            bias: Some(Matrix::zeros(1, out_dim)),
        }
    }

    /// Zero-initialized head without bias
    pub fn without_bias(in_dim: usize, out_dim: usize) -> Self {
        Self {
            bias: None,
            ..Self::new(in_dim, out_dim)
        }
    }

    pub fn with_init(in_dim: usize, out_dim: usize, init: &LinearInit) -> Self {
        let mut head = if init.bias {
            Self::new(in_dim, out_dim)
        } else {
            Self::without_bias(in_dim, out_dim)
        };
        head.reset_parameters(init);
        head
    }

    pub fn from_config(in_dim: usize, out_dim: usize, config: &HeadConfig) -> Result<Self> {
        Matrix::checked_len(out_dim, in_dim)?;
        Ok(Self::with_init(in_dim, out_dim, &LinearInit::from_config(config)?))
    }

    /// Head with explicit parameters; widths are taken from `weight`
    pub fn with_parameters(weight: Matrix, bias: Option<Matrix>) -> Result<Self> {
        let (out_dim, in_dim) = weight.shape();
        if let Some(b) = &bias {
            if b.shape() != (1, out_dim) {
                return Err(PipeError::shape((1, out_dim), b.shape()));
            }
        }
        Ok(Self {
            in_dim,
            out_dim,
            weight,
            bias,
        })
    }

    pub fn weight(&self) -> &Matrix {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Matrix> {
        self.bias.as_ref()
    }

    /// Re-draw weights and refill the bias
    pub fn reset_parameters(&mut self, init: &LinearInit) {
        match init.method {
            InitMethod::Zeros => self.weight = Matrix::zeros(self.out_dim, self.in_dim),
            InitMethod::XavierUniform => {
                self.weight = xavier_uniform(self.out_dim, self.in_dim, self.in_dim, self.out_dim, init.seed);
            }
        }
        if let Some(bias) = self.bias.as_mut() {
            *bias = Matrix::filled(1, self.out_dim, init.bias_fill);
        }
    }
}

impl Head for LinearHead {
    fn kind(&self) -> &str {
        "linear"
    }

    fn in_dim(&self) -> usize {
        self.in_dim
    }

    fn out_dim(&self) -> usize {
        self.out_dim
    }

    fn forward(&self, net: &Matrix) -> Result<Matrix> {
        net.project(&self.weight, self.bias.as_ref())
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params = vec![Parameter::new("weight", self.weight.clone())];
        if let Some(b) = &self.bias {
            params.push(Parameter::new("bias", b.clone()));
        }
        params
    }

    fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()> {
        let slot = match name {
            "weight" => &mut self.weight,
            "bias" => self.bias.as_mut().ok_or_else(|| PipeError::UnknownParameter {
                owner: "linear head without bias".into(),
                name: name.into(),
            })?,
            _ => {
                return Err(PipeError::UnknownParameter {
                    owner: "linear head".into(),
                    name: name.into(),
                });
            }
        };
        if slot.shape() != value.shape() {
            return Err(PipeError::shape(slot.shape(), value.shape()));
        }
        *slot = value;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MIXTURE
// ═══════════════════════════════════════════════════════════════════════════════

/// Linear scalar output routed to one slot of the target row
///
/// The other slots are zero, so summing mixture heads that own different
/// slots reconstructs the full target.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureHead {
    linear: LinearHead,
    target_dim: usize,
    out_dim: usize,
}

impl MixtureHead {
    pub fn new(linear: LinearHead, target_dim: usize, out_dim: usize) -> Result<Self> {
        if linear.out_dim() != 1 {
            return Err(PipeError::dimension("mixture inner linear output", 1, linear.out_dim()));
        }
        if target_dim >= out_dim {
            return Err(PipeError::InvalidConfig(format!(
                "target_dim {} is out of range for output width {}",
                target_dim, out_dim
            )));
        }
        Ok(Self {
            linear,
            target_dim,
            out_dim,
        })
    }

    pub fn from_config(in_dim: usize, out_dim: usize, config: &HeadConfig) -> Result<Self> {
        let target_dim = config.usize_required("target_dim")?;
        let linear = LinearHead::from_config(in_dim, 1, config)?;
        Self::new(linear, target_dim, out_dim)
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn linear(&self) -> &LinearHead {
        &self.linear
    }
}

impl Head for MixtureHead {
    fn kind(&self) -> &str {
        "mixture"
    }

    fn in_dim(&self) -> usize {
        self.linear.in_dim()
    }

    fn out_dim(&self) -> usize {
        self.out_dim
    }

    fn forward(&self, net: &Matrix) -> Result<Matrix> {
        let scalar = self.linear.forward(net)?;
        scalar.scatter_columns(self.out_dim, self.target_dim)
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.linear
            .parameters()
            .into_iter()
            .map(|p| Parameter::new(format!("linear.{}", p.name), p.value))
            .collect()
    }

    fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()> {
        match name.strip_prefix("linear.") {
            Some(inner) => self.linear.set_parameter(inner, value),
            None => Err(PipeError::UnknownParameter {
                owner: "mixture head".into(),
                name: name.into(),
            }),
        }
    }
}

/// `rows x cols` weights uniform in `±sqrt(6 / (fan_in + fan_out))`
fn xavier_uniform(rows: usize, cols: usize, fan_in: usize, fan_out: usize, seed: u64) -> Matrix {
    let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut weight = Matrix::zeros(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            weight.set(r, c, rng.gen_range(-limit..=limit));
        }
    }
    weight
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAPPING
// ═══════════════════════════════════════════════════════════════════════════════

/// Nonlinearity applied after a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Tanh,
    Sigmoid,
    /// No activation (`"none"` or a null value)
    Identity,
}

impl Activation {
    #[inline]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Tanh => v.tanh(),
            Activation::Sigmoid => sigmoid(v),
            Activation::Identity => v,
        }
    }

    fn from_config(config: &HeadConfig) -> Result<Self> {
        match config.get("activation") {
            None => Ok(Activation::Relu),
            Some(Value::Null) => Ok(Activation::Identity),
            Some(_) => config.str_or("activation", "relu")?.parse(),
        }
    }
}

impl FromStr for Activation {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            "none" | "identity" => Ok(Activation::Identity),
            other => Err(PipeError::InvalidConfig(format!(
                "unknown activation '{}' (expected 'relu', 'tanh', 'sigmoid' or 'none')",
                other
            ))),
        }
    }
}

pub const BATCH_NORM_EPS: f64 = 1e-5;

/// Batch normalization with frozen running statistics
///
/// `(x - running_mean) / sqrt(running_var + eps) * weight + bias`, per column.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchNorm {
    weight: Matrix,
    bias: Matrix,
    running_mean: Matrix,
    running_var: Matrix,
}

impl BatchNorm {
    /// Identity-like statistics: mean 0, variance 1, unit scale, zero shift
    pub fn new(dim: usize) -> Self {
        Self {
            weight: Matrix::filled(1, dim, 1.0),
            bias: Matrix::zeros(1, dim),
            running_mean: Matrix::zeros(1, dim),
            running_var: Matrix::filled(1, dim, 1.0),
        }
    }

    pub fn dim(&self) -> usize {
        self.weight.cols()
    }

    pub fn forward(&self, net: &Matrix) -> Result<Matrix> {
        if net.cols() != self.dim() {
            return Err(PipeError::shape((net.rows(), self.dim()), net.shape()));
        }
        let mut out = net.clone();
        for r in 0..net.rows() {
            for c in 0..net.cols() {
                let scale = self.weight.get(0, c) / (self.running_var.get(0, c) + BATCH_NORM_EPS).sqrt();
                let value = (net.get(r, c) - self.running_mean.get(0, c)) * scale + self.bias.get(0, c);
                out.set(r, c, value);
            }
        }
        Ok(out)
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::new("weight", self.weight.clone()),
            Parameter::new("bias", self.bias.clone()),
            Parameter::new("running_mean", self.running_mean.clone()),
            Parameter::new("running_var", self.running_var.clone()),
        ]
    }

    pub fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()> {
        let slot = match name {
            "weight" => &mut self.weight,
            "bias" => &mut self.bias,
            "running_mean" => &mut self.running_mean,
            "running_var" => {
                if value.data().iter().any(|v| *v < 0.0) {
                    return Err(PipeError::InvalidInput("running_var must be non-negative".into()));
                }
                &mut self.running_var
            }
            _ => {
                return Err(PipeError::UnknownParameter {
                    owner: "batch norm".into(),
                    name: name.into(),
                });
            }
        };
        if slot.shape() != value.shape() {
            return Err(PipeError::shape(slot.shape(), value.shape()));
        }
        *slot = value;
        Ok(())
    }
}

/// Settings of one hidden [`Mapping`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingConfig {
    pub init: LinearInit,
    pub batch_norm: bool,
    pub activation: Activation,
    /// Training-time drop rate; inactive at prediction
    pub dropout: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            init: LinearInit {
                bias: false,
                ..LinearInit::default()
            },
            batch_norm: true,
            activation: Activation::Relu,
            dropout: 0.5,
        }
    }
}

impl MappingConfig {
    pub fn from_config(config: &HeadConfig) -> Result<Self> {
        let batch_norm = config.bool_or("batch_norm", true)?;
        let bias = config.bool_or("bias", !batch_norm)?;
        let dropout = config.f64_or("dropout", 0.5)?;
        if !(0.0..=1.0).contains(&dropout) {
            return Err(PipeError::InvalidConfig(format!(
                "dropout {} is outside [0, 1]",
                dropout
            )));
        }
        Ok(Self {
            init: LinearInit {
                bias,
                ..LinearInit::from_config(config)?
            },
            batch_norm,
            activation: Activation::from_config(config)?,
            dropout,
        })
    }
}

/// Hidden layer: linear, optional batch norm, activation
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    linear: LinearHead,
    bn: Option<BatchNorm>,
    activation: Activation,
    dropout: f64,
}

impl Mapping {
    pub fn new(in_dim: usize, out_dim: usize, config: &MappingConfig) -> Self {
        Self {
            linear: LinearHead::with_init(in_dim, out_dim, &config.init),
            bn: config.batch_norm.then(|| BatchNorm::new(out_dim)),
            activation: config.activation,
            dropout: config.dropout,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.linear.in_dim()
    }

    pub fn out_dim(&self) -> usize {
        self.linear.out_dim()
    }

    pub fn linear(&self) -> &LinearHead {
        &self.linear
    }

    pub fn batch_norm(&self) -> Option<&BatchNorm> {
        self.bn.as_ref()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    /// Prediction-time pass; dropout does not apply
    pub fn forward(&self, net: &Matrix) -> Result<Matrix> {
        let mut net = self.linear.forward(net)?;
        if let Some(bn) = &self.bn {
            net = bn.forward(&net)?;
        }
        let activation = self.activation;
        Ok(net.map(|v| activation.apply(v)))
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        let mut params = self.linear.parameters();
        if let Some(bn) = &self.bn {
            params.extend(
                bn.parameters()
                    .into_iter()
                    .map(|p| Parameter::new(format!("bn.{}", p.name), p.value)),
            );
        }
        params
    }

    pub fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()> {
        match name.strip_prefix("bn.") {
            Some(inner) => match self.bn.as_mut() {
                Some(bn) => bn.set_parameter(inner, value),
                None => Err(PipeError::UnknownParameter {
                    owner: "mapping without batch norm".into(),
                    name: name.into(),
                }),
            },
            None => self.linear.set_parameter(name, value),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MLP
// ═══════════════════════════════════════════════════════════════════════════════

/// Multi-layer perceptron head
///
/// Parameters are named `mapping_<i>.<name>`; the final linear layer is
/// `mapping_<num hidden>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MlpHead {
    mappings: Vec<Mapping>,
    output: LinearHead,
}

impl MlpHead {
    /// One hidden mapping per `(width, config)`, then a linear layer to `out_dim`
    pub fn new(in_dim: usize, out_dim: usize, layers: &[(usize, MappingConfig)], output: &LinearInit) -> Self {
        let mut mappings = Vec::with_capacity(layers.len());
        let mut width = in_dim;
        for (units, config) in layers {
            mappings.push(Mapping::new(width, *units, config));
            width = *units;
        }
        Self {
            mappings,
            output: LinearHead::with_init(width, out_dim, output),
        }
    }

    pub fn from_config(in_dim: usize, out_dim: usize, config: &HeadConfig) -> Result<Self> {
        let num_units = config.usize_list_or("num_units", &[16])?;
        if num_units.contains(&0) {
            return Err(PipeError::InvalidConfig("num_units entries must be positive".into()));
        }
        let mut width = in_dim;
        for &units in num_units.iter().chain(std::iter::once(&out_dim)) {
            Matrix::checked_len(units, width)?;
            width = units;
        }

        let layer_configs = config.nested_list("mapping_configs", num_units.len())?;
        let mut layers = Vec::with_capacity(num_units.len());
        for (i, (&units, layer)) in num_units.iter().zip(&layer_configs).enumerate() {
            let mut mapping = MappingConfig::from_config(&config.merged(layer))?;
            mapping.init.seed = mapping.init.seed.wrapping_add(i as u64);
            layers.push((units, mapping));
        }

        let final_config = config.merged(&config.nested("final_mapping_config")?);
        let mut output = LinearInit::from_config(&final_config)?;
        output.seed = output.seed.wrapping_add(num_units.len() as u64);

        Ok(Self::new(in_dim, out_dim, &layers, &output))
    }

    /// Hidden mappings plus the output layer
    pub fn depth(&self) -> usize {
        self.mappings.len() + 1
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn output(&self) -> &LinearHead {
        &self.output
    }

    fn split_name<'a>(&self, name: &'a str) -> Result<(usize, &'a str)> {
        let unknown = || PipeError::UnknownParameter {
            owner: "mlp head".into(),
            name: name.into(),
        };
        let rest = name.strip_prefix("mapping_").ok_or_else(unknown)?;
        let (index, inner) = rest.split_once('.').ok_or_else(unknown)?;
        let index: usize = index.parse().map_err(|_| unknown())?;
        if index > self.mappings.len() {
            return Err(unknown());
        }
        Ok((index, inner))
    }
}

impl Head for MlpHead {
    fn kind(&self) -> &str {
        "mlp"
    }

    fn in_dim(&self) -> usize {
        self.mappings.first().map_or(self.output.in_dim(), Mapping::in_dim)
    }

    fn out_dim(&self) -> usize {
        self.output.out_dim()
    }

    fn forward(&self, net: &Matrix) -> Result<Matrix> {
        let mut net = net.clone();
        for mapping in &self.mappings {
            net = mapping.forward(&net)?;
        }
        self.output.forward(&net)
    }

    fn parameters(&self) -> Vec<Parameter> {
        let hidden = self.mappings.iter().map(Mapping::parameters);
        hidden
            .chain(std::iter::once(self.output.parameters()))
            .enumerate()
            .flat_map(|(i, params)| {
                params
                    .into_iter()
                    .map(move |p| Parameter::new(format!("mapping_{}.{}", i, p.name), p.value))
            })
            .collect()
    }

    fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()> {
        let (index, inner) = self.split_name(name)?;
        match self.mappings.get_mut(index) {
            Some(mapping) => mapping.set_parameter(inner, value),
            None => self.output.set_parameter(inner, value),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DNDF
// ═══════════════════════════════════════════════════════════════════════════════

/// Deepest supported tree; a tree has `2^(depth + 1)` leaves
pub const MAX_TREE_DEPTH: usize = 20;

/// Deep neural decision forest head
///
/// A linear projection gives every internal node of every tree a sigmoid
/// probability of routing left. Nodes are numbered breadth first, so the
/// node at `level` above leaf `l` is `2^level - 1 + (l >> (depth + 1 - level))`.
/// The output is the route-weighted sum of leaf values averaged over trees;
/// for classification with more than one class each leaf row is a softmax.
#[derive(Debug, Clone, PartialEq)]
pub struct DndfHead {
    tree_proj: LinearHead,
    /// `(num_tree * num_leaf, out_dim)`, tree-major
    leaves: Matrix,
    num_tree: usize,
    tree_depth: usize,
    is_regression: bool,
}

impl DndfHead {
    pub fn new(
        in_dim: usize,
        out_dim: usize,
        num_tree: usize,
        tree_depth: usize,
        is_regression: bool,
        init: &LinearInit,
    ) -> Result<Self> {
        if num_tree == 0 {
            return Err(PipeError::InvalidConfig("num_tree must be positive".into()));
        }
        if tree_depth > MAX_TREE_DEPTH {
            return Err(PipeError::InvalidConfig(format!(
                "tree_depth {} exceeds {}",
                tree_depth, MAX_TREE_DEPTH
            )));
        }
        let num_leaf = 1usize << (tree_depth + 1);
        let proj_width = Matrix::checked_len(num_leaf - 1, num_tree)?;
        let leaf_rows = Matrix::checked_len(num_leaf, num_tree)?;
        Matrix::checked_len(proj_width, in_dim)?;
        Matrix::checked_len(leaf_rows, out_dim)?;

        // fans of a (num_tree, num_leaf, out_dim) tensor
        let leaves = xavier_uniform(
            leaf_rows,
            out_dim,
            num_leaf * out_dim,
            num_tree * out_dim,
            init.seed.wrapping_add(1),
        );
        Ok(Self {
            tree_proj: LinearHead::with_init(in_dim, proj_width, init),
            leaves,
            num_tree,
            tree_depth,
            is_regression,
        })
    }

    pub fn from_config(in_dim: usize, out_dim: usize, config: &HeadConfig) -> Result<Self> {
        let num_tree = config.usize_opt("num_tree")?.unwrap_or(10);
        let tree_depth = config.usize_opt("tree_depth")?.unwrap_or(4);
        let is_regression = config.bool_or("is_regression", out_dim == 1)?;
        let proj_config = config.merged(&config.nested("tree_proj_config")?);
        let init = LinearInit::from_config(&proj_config)?;
        Self::new(in_dim, out_dim, num_tree, tree_depth, is_regression, &init)
    }

    pub fn num_tree(&self) -> usize {
        self.num_tree
    }

    pub fn tree_depth(&self) -> usize {
        self.tree_depth
    }

    pub fn num_leaf(&self) -> usize {
        1 << (self.tree_depth + 1)
    }

    pub fn num_internals(&self) -> usize {
        self.num_leaf() - 1
    }

    pub fn is_regression(&self) -> bool {
        self.is_regression
    }

    pub fn leaves(&self) -> &Matrix {
        &self.leaves
    }

    /// Probability of reaching each leaf, `(rows, num_tree * num_leaf)`
    pub fn routes(&self, net: &Matrix) -> Result<Matrix> {
        let decisions = self.tree_proj.forward(net)?.map(sigmoid);
        let (num_leaf, internals, depth) = (self.num_leaf(), self.num_internals(), self.tree_depth);

        let mut routes = Matrix::zeros(net.rows(), self.num_tree * num_leaf);
        for r in 0..net.rows() {
            let row = decisions.row(r);
            for t in 0..self.num_tree {
                let p_left = &row[t * internals..(t + 1) * internals];
                for leaf in 0..num_leaf {
                    let mut prob = 1.0;
                    for level in 0..=depth {
                        let node = (1usize << level) - 1 + (leaf >> (depth + 1 - level));
                        let right = (leaf >> (depth - level)) & 1 == 1;
                        prob *= if right { 1.0 - p_left[node] } else { p_left[node] };
                    }
                    routes.set(r, t * num_leaf + leaf, prob);
                }
            }
        }
        Ok(routes)
    }

    fn leaf_values(&self) -> Matrix {
        if self.is_regression || self.leaves.cols() <= 1 {
            return self.leaves.clone();
        }
        let mut values = self.leaves.clone();
        for r in 0..values.rows() {
            let max = values.row(r).iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let total: f64 = values.row(r).iter().map(|v| (v - max).exp()).sum();
            for c in 0..values.cols() {
                values.set(r, c, (values.get(r, c) - max).exp() / total);
            }
        }
        values
    }
}

impl Head for DndfHead {
    fn kind(&self) -> &str {
        "dndf"
    }

    fn in_dim(&self) -> usize {
        self.tree_proj.in_dim()
    }

    fn out_dim(&self) -> usize {
        self.leaves.cols()
    }

    fn forward(&self, net: &Matrix) -> Result<Matrix> {
        let routes = self.routes(net)?;
        let values = self.leaf_values();
        let trees = self.num_tree as f64;

        let mut out = Matrix::zeros(net.rows(), self.out_dim());
        for r in 0..routes.rows() {
            for (leaf, &prob) in routes.row(r).iter().enumerate() {
                for o in 0..values.cols() {
                    out.set(r, o, out.get(r, o) + prob * values.get(leaf, o) / trees);
                }
            }
        }
        Ok(out)
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut params: Vec<Parameter> = self
            .tree_proj
            .parameters()
            .into_iter()
            .map(|p| Parameter::new(format!("tree_proj.{}", p.name), p.value))
            .collect();
        params.push(Parameter::new("leaves", self.leaves.clone()));
        params
    }

    fn set_parameter(&mut self, name: &str, value: Matrix) -> Result<()> {
        if let Some(inner) = name.strip_prefix("tree_proj.") {
            return self.tree_proj.set_parameter(inner, value);
        }
        if name != "leaves" {
            return Err(PipeError::UnknownParameter {
                owner: "dndf head".into(),
                name: name.into(),
            });
        }
        if value.shape() != self.leaves.shape() {
            return Err(PipeError::shape(self.leaves.shape(), value.shape()));
        }
        self.leaves = value;
        Ok(())
    }
}
