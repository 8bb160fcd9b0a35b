//! pipekit - composable extractor/head models
//! Command-line interface for inspecting, running and comparing models

mod data;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use pipekit_compose::prelude::*;
use pipekit_eval::{evaluate, Metric};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pipekit")]
#[command(version = "2026.1.16")]
#[command(about = "pipekit - composable extractor/head models", long_about = None)]
struct Cli {
    /// Log filter, e.g. "pipekit=debug" (falls back to RUST_LOG)
    #[arg(long, global = true, env = "PIPEKIT_LOG")]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered extractors, heads, head configs and models
    Components,

    /// Build the model described by a manifest and show its pipes
    Inspect {
        /// Model manifest (TOML)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },

    /// Predict with a fitted model
    Predict {
        /// Saved fitted model (JSON), or a manifest (TOML) when --params is given
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Parameter snapshot (JSON) for a manifest with use_simplify_data = true
        #[arg(short, long, value_name = "SNAPSHOT", env = "PIPEKIT_PARAMS")]
        params: Option<PathBuf>,

        /// Input features (CSV)
        #[arg(short, long, value_name = "CSV")]
        input: PathBuf,

        /// Print the predicted class per row instead of raw scores
        #[arg(long)]
        classes: bool,
    },

    /// Compare fitted models on one dataset
    Evaluate {
        /// Features followed by targets (CSV)
        #[arg(short, long, value_name = "CSV")]
        input: PathBuf,

        /// Number of trailing target columns
        #[arg(short, long, default_value_t = 1)]
        targets: usize,

        /// Model to score, as NAME=SAVED or NAME=MANIFEST:SNAPSHOT (repeatable)
        #[arg(short, long = "model", value_name = "NAME=MODEL", required = true)]
        models: Vec<String>,

        /// Metrics to report (default: all)
        #[arg(long = "metric", value_name = "METRIC")]
        metrics: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let result = match cli.command {
        Commands::Components => components_command(),
        Commands::Inspect { manifest } => inspect_command(&manifest),
        Commands::Predict {
            model,
            params,
            input,
            classes,
        } => predict_command(&model, params.as_deref(), &input, classes),
        Commands::Evaluate {
            input,
            targets,
            models,
            metrics,
        } => evaluate_command(&input, targets, &models, &metrics),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => tracing_subscriber::EnvFilter::new(f),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pipekit=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ============================================================================
// Commands
// ============================================================================

fn components_command() -> Result<()> {
    let registry = Registry::with_builtins();
    for category in Category::all() {
        println!("{}", category.as_str().bold());
        for name in registry.names(category) {
            println!("  {}", name.cyan());
        }
    }
    Ok(())
}

fn inspect_command(manifest_path: &Path) -> Result<()> {
    let manifest = ModelManifest::from_file(manifest_path)?;
    let registry = Registry::with_builtins();
    let untrained = make(&registry, &manifest.model.name, manifest.to_make_config())?;
    let model = untrained.model();

    println!(
        "{} {} ({} -> {}, {}, {})",
        "Model".green().bold(),
        model.name().cyan(),
        model.shape().in_dim,
        model.shape().out_dim,
        model.aggregation(),
        manifest.model.task_type
    );
    for pipe in model.pipes() {
        let parameter_count: usize = pipe
            .head()
            .parameters()
            .iter()
            .map(|p| p.value.data().len())
            .sum();
        println!(
            "  {} {}: {} [{} -> {}] -> {} [{} -> {}], {} parameters",
            "pipe".bold(),
            pipe.name().cyan(),
            pipe.extractor_name(),
            model.shape().in_dim,
            pipe.extractor().out_dim(),
            pipe.head_name(),
            pipe.head().in_dim(),
            pipe.head().out_dim(),
            parameter_count
        );
        if !pipe.head_config().is_empty() {
            println!("      config {}", serde_json::to_string(pipe.head_config())?);
        }
    }
    Ok(())
}

fn predict_command(model_path: &Path, params: Option<&Path>, input: &Path, classes: bool) -> Result<()> {
    let registry = Registry::with_builtins();
    let fitted = load_fitted(&registry, model_path, params)?;
    let x = data::read_matrix(input)?;

    if classes {
        for class in fitted.predict_classes(&x)? {
            println!("{}", class);
        }
    } else {
        println!("{}", data::format_rows(&fitted.predict(&x)?));
    }
    Ok(())
}

fn evaluate_command(input: &Path, targets: usize, models: &[String], metrics: &[String]) -> Result<()> {
    let metrics = metrics
        .iter()
        .map(|m| m.parse::<Metric>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let table = data::read_matrix(input)?;
    let (x, y) = data::split_targets(&table, targets)?;

    let registry = Registry::with_builtins();
    let mut fitted = Vec::with_capacity(models.len());
    for spec in models {
        let (name, model_path, snapshot) = parse_model_arg(spec)?;
        let model = load_fitted(&registry, &model_path, snapshot.as_deref())
            .with_context(|| format!("failed to load model '{}'", name))?;
        fitted.push((name, model));
    }

    let pipelines: Vec<(&str, &dyn Predictor)> = fitted
        .iter()
        .map(|(name, model)| (name.as_str(), model as &dyn Predictor))
        .collect();
    let report = evaluate(&x, &y, &pipelines, &metrics)?;
    println!("{}", report);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Load a saved fitted model, or build a manifest's model and install `params`
fn load_fitted(registry: &Registry, model_path: &Path, params: Option<&Path>) -> Result<FittedModel> {
    let Some(params) = params else {
        return FittedModel::load(registry, model_path)
            .with_context(|| format!("failed to load fitted model {}", model_path.display()));
    };

    let manifest = ModelManifest::from_file(model_path)?;
    let snapshot = ModelSnapshot::load(params)
        .with_context(|| format!("failed to load snapshot {}", params.display()))?;
    let untrained = make(registry, &manifest.model.name, manifest.to_make_config())?;
    untrained
        .install(&snapshot)
        .with_context(|| format!("failed to install {} into {}", params.display(), model_path.display()))
}

/// Split `NAME=SAVED` or `NAME=MANIFEST:SNAPSHOT`
fn parse_model_arg(spec: &str) -> Result<(String, PathBuf, Option<PathBuf>)> {
    let Some((name, paths)) = spec.split_once('=') else {
        bail!("expected NAME=SAVED or NAME=MANIFEST:SNAPSHOT, got '{}'", spec);
    };
    let (model, snapshot) = match paths.rsplit_once(':') {
        Some((manifest, snapshot)) => {
            if snapshot.is_empty() {
                bail!("empty snapshot path in model argument '{}'", spec);
            }
            (manifest, Some(PathBuf::from(snapshot)))
        }
        None => (paths, None),
    };
    if name.is_empty() || model.is_empty() {
        bail!("empty field in model argument '{}'", spec);
    }
    Ok((name.to_string(), PathBuf::from(model), snapshot))
}
