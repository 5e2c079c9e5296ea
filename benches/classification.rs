use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use racoons::pipeline::build_model;
use racoons::preprocessing::{ScaleLevel, ScaleLevels};
use racoons::validation::{cross_validate_with_config, CrossValidationConfig};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // Label by the sum of the first two features plus noise
    let y = Array1::from_iter(x.rows().into_iter().map(|row| {
        let score = row[0] + row[1.min(n_features - 1)] + rng.gen::<f64>() * 2.0;
        if score > 11.0 { 1.0 } else { 0.0 }
    }));
    (x, y)
}

fn levels(n_features: usize) -> ScaleLevels {
    let pairs: Vec<(String, ScaleLevel)> = (0..n_features)
        .map(|i| (format!("feature_{}", i), ScaleLevel::Continuous))
        .collect();
    ScaleLevels::from_pairs(&pairs)
}

fn bench_cross_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_validation");
    group.sample_size(10);

    let config = CrossValidationConfig::default();
    for name in ["logistic_regression", "decision_tree", "random_forest"] {
        for n_rows in [200, 1000].iter() {
            let (x, y) = create_classification_data(*n_rows, 8);
            let model = build_model(&levels(8), None, None, name).unwrap();

            group.bench_with_input(BenchmarkId::new(name, n_rows), &(x, y), |b, (x, y)| {
                b.iter(|| cross_validate_with_config(&model, black_box(x), black_box(y), &config).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_smote_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("smote_pipeline");
    group.sample_size(10);

    for n_rows in [200, 1000].iter() {
        let (x, y) = create_classification_data(*n_rows, 8);
        let model = build_model(&levels(8), Some("smote"), Some("lasso"), "xgboost").unwrap();

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut fitted = model.clone();
                fitted.fit(black_box(x), black_box(y)).unwrap();
                fitted
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cross_validation, bench_smote_pipeline);
criterion_main!(benches);
