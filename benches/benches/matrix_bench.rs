//! # Matrix Benchmarks
//!
//! Measures the dense kernels every pipe runs: projection, row products,
//! column stacking and the normalizer fit.
//!
//! Run: `cargo bench --bench matrix_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipekit_compose::Normalizer;
use pipekit_core::Matrix;

fn sample(rows: usize, cols: usize) -> Matrix {
    let mut m = Matrix::zeros(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            m.set(r, c, ((r * 31 + c * 17) % 13) as f64 / 13.0 + 0.5);
        }
    }
    m
}

/// Benchmark `X · Wᵗ + b` across batch sizes
fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");

    let weight = sample(8, 32);
    let bias = Matrix::filled(1, 8, 0.1);

    for rows in [16, 256, 4096] {
        let x = sample(rows, 32);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &x, |b, x| {
            b.iter(|| black_box(x.project(&weight, Some(&bias))))
        });
    }

    group.finish();
}

fn bench_row_products(c: &mut Criterion) {
    let x = sample(1024, 16);
    c.bench_function("row_products_1024x16", |b| b.iter(|| black_box(x.row_products())));
}

fn bench_hstack(c: &mut Criterion) {
    let parts = vec![sample(1024, 4), sample(1024, 2), sample(1024, 1)];
    c.bench_function("hstack_3_parts", |b| b.iter(|| black_box(Matrix::hstack(&parts))));
}

fn bench_normalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalizer");
    let x = sample(4096, 16);

    group.bench_function("fit", |b| b.iter(|| black_box(Normalizer::fit(&x))));

    let normalizer = Normalizer::fit(&x);
    group.bench_function("apply", |b| b.iter(|| black_box(normalizer.apply(&x))));

    group.finish();
}

criterion_group!(benches, bench_project, bench_row_products, bench_hstack, bench_normalizer);
criterion_main!(benches);
