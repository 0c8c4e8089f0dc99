//! Benchmarks for batch iteration and accuracy scoring

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fedtorch::data::{DataLoader, Dataset, TensorDataset};
use fedtorch::utils::metrics::default_metric;
use ndarray::{Array1, Array2};
use std::hint::black_box;
use std::sync::Arc;

fn dataset(samples: usize, features: usize) -> Arc<dyn Dataset> {
    let inputs = Array2::from_shape_fn((samples, features), |(i, j)| ((i + j) % 17) as f32).into_dyn();
    let targets = Array1::from_shape_fn(samples, |i| (i % 10) as f32).into_dyn();
    Arc::new(TensorDataset::new(inputs, targets).expect("matching sample counts"))
}

fn bench_loader_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("dataloader_pass");
    let ds = dataset(4096, 64);

    for &workers in &[0usize, 4] {
        let loader = DataLoader::new(Arc::clone(&ds), 64, true, workers).expect("loader");
        group.bench_with_input(BenchmarkId::new("workers", workers), &loader, |b, loader| {
            b.iter(|| {
                for batch in loader.iter() {
                    black_box(batch.expect("batch"));
                }
            });
        });
    }
    group.finish();
}

fn bench_default_metric(c: &mut Criterion) {
    let y_true = Array1::from_shape_fn(10_000, |i| (i % 10) as f32).into_dyn();
    let y_pred = Array2::from_shape_fn((10_000, 10), |(i, j)| ((i * 7 + j * 3) % 11) as f32).into_dyn();

    c.bench_function("default_metric_argmax", |b| {
        b.iter(|| default_metric(black_box(&y_true), black_box(&y_pred)).expect("metric"))
    });
}

criterion_group!(benches, bench_loader_pass, bench_default_metric);
criterion_main!(benches);
