//! # Prediction Benchmarks
//!
//! Measures model construction through the registry and end-to-end
//! prediction for the built-in models, plus report generation.
//!
//! Run: `cargo bench --bench predict_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipekit_compose::prelude::*;
use pipekit_eval::{evaluate, Metric};

fn sample(rows: usize, cols: usize) -> Matrix {
    let mut m = Matrix::zeros(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            m.set(r, c, ((r + 3 * c) % 7) as f64 / 7.0 + 0.5);
        }
    }
    m
}

/// Benchmark registry resolution and width checks
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_model");
    let registry = Registry::with_builtins();

    group.bench_function("with_builtins", |b| b.iter(|| black_box(Registry::with_builtins())));

    for name in ["linear", "fcnn", "mixture"] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &name, |b, name| {
            b.iter(|| black_box(registry.build_model(name, &[], Shape::new(5, 2))))
        });
    }

    group.finish();
}

/// Benchmark forward passes on a 1024-row batch
fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let registry = Registry::with_builtins();
    let x = sample(1024, 5);

    for name in ["linear", "fcnn", "mixture"] {
        let Ok(model) = registry.build_model(name, &[], Shape::new(5, 2)) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::from_parameter(name), &model, |b, model| {
            b.iter(|| black_box(model.predict(&x)))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let registry = Registry::with_builtins();
    let x = sample(1024, 5);
    let y = sample(1024, 2);

    let models: Vec<(&str, Model)> = ["linear", "fcnn", "mixture"]
        .into_iter()
        .filter_map(|name| {
            registry
                .build_model(name, &[], Shape::new(5, 2))
                .ok()
                .map(|m| (name, m))
        })
        .collect();
    let pipelines: Vec<(&str, &dyn Predictor)> = models
        .iter()
        .map(|(name, model)| (*name, model as &dyn Predictor))
        .collect();

    c.bench_function("evaluate_3_models", |b| {
        b.iter(|| black_box(evaluate(&x, &y, &pipelines, &Metric::ALL)))
    });
}

criterion_group!(benches, bench_build, bench_predict, bench_evaluate);
criterion_main!(benches);
