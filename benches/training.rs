use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use diabetes_ensemble::ensemble::{EnsembleCombiner, EnsembleWeights};
use diabetes_ensemble::export::MemoryStore;
use diabetes_ensemble::features::{FeatureDeriver, FeatureMatrix};
use diabetes_ensemble::training::{
    CVStrategy, CrossValTrainer, ModelKind, ModelParams, ProbabilisticClassifier,
};
use ndarray::Array1;
use polars::prelude::*;
use rand::prelude::*;

fn create_patient_data(n_rows: usize) -> DataFrame {
    let mut rng = rand::thread_rng();
    let mut column = |base: f64, spread: f64| -> Vec<f64> {
        (0..n_rows).map(|_| base + rng.gen::<f64>() * spread).collect()
    };

    let age = column(20.0, 60.0);
    let bmi = column(18.0, 20.0);
    let systolic = column(100.0, 60.0);
    let diastolic = column(60.0, 40.0);
    let cholesterol = column(150.0, 100.0);
    let ldl = column(70.0, 100.0);
    let hdl = column(30.0, 50.0);
    let triglycerides = column(50.0, 200.0);
    let activity = column(0.0, 300.0);

    // Label loosely follows BMI and age
    let target: Vec<i64> = (0..n_rows)
        .map(|i| i64::from(bmi[i] * 0.1 + age[i] * 0.02 > 4.5))
        .collect();

    df!(
        "id" => (0..n_rows as i64).collect::<Vec<_>>(),
        "age" => age,
        "bmi" => bmi,
        "systolic_bp" => systolic,
        "diastolic_bp" => diastolic,
        "cholesterol" => cholesterol,
        "ldl" => ldl,
        "hdl" => hdl,
        "triglycerides" => triglycerides,
        "physical_activity" => activity,
        "diagnosed_diabetes" => target,
    )
    .unwrap()
}

fn bench_params() -> ModelParams {
    let mut params = ModelParams::default().with_seed(42);
    params.lightgbm.n_estimators = 50;
    params.xgboost.n_estimators = 50;
    params.catboost.n_estimators = 50;
    params
}

fn bench_feature_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");

    for n_rows in [1000, 10000].iter() {
        let df = create_patient_data(*n_rows);
        group.bench_with_input(BenchmarkId::new("derive", n_rows), &df, |b, df| {
            b.iter(|| FeatureDeriver::new().derive(black_box(df)).unwrap())
        });
    }

    group.finish();
}

fn bench_classifiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let df = create_patient_data(2000);
    let (matrix, y) = FeatureMatrix::for_training(&df, "diagnosed_diabetes").unwrap();
    let params = bench_params();

    for kind in ModelKind::ALL {
        group.bench_with_input(BenchmarkId::new("fit", kind.name()), &kind, |b, &kind| {
            b.iter(|| {
                let mut classifier = params.build(kind);
                classifier.fit(black_box(&matrix.x), black_box(&y)).unwrap();
                classifier
            })
        });
    }

    group.finish();
}

fn bench_ensemble_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("inference");
    group.sample_size(10);

    let df = create_patient_data(2000);
    let (matrix, y): (FeatureMatrix, Array1<f64>) =
        FeatureMatrix::for_training(&df, "diagnosed_diabetes").unwrap();
    let mut store = MemoryStore::new();
    CrossValTrainer::new(bench_params(), CVStrategy::default(), 42)
        .train_all(&matrix, &y, &mut store)
        .unwrap();

    let combiner = EnsembleCombiner::new(EnsembleWeights::default());
    group.bench_function("combine_5_folds", |b| {
        b.iter(|| combiner.combine(&store, black_box(&matrix)).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_feature_derivation,
    bench_classifiers,
    bench_ensemble_inference
);
criterion_main!(benches);
