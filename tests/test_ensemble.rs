//! Integration tests for artifact persistence and the weighted ensemble

use diabetes_ensemble::ensemble::{EnsembleCombiner, EnsembleWeights, Submission};
use diabetes_ensemble::error::PipelineError;
use diabetes_ensemble::export::{ArtifactStore, DirectoryStore, ModelArtifact};
use diabetes_ensemble::features::FeatureMatrix;
use diabetes_ensemble::training::{
    CVStrategy, CatBoostConfig, CrossValTrainer, LightGBMConfig, ModelKind, ModelParams,
    XGBoostConfig,
};
use diabetes_ensemble::utils::DataLoader;
use ndarray::{Array1, Array2};
use polars::prelude::*;

fn fixture(n_rows: usize) -> (FeatureMatrix, Array1<f64>) {
    let y = Array1::from_shape_fn(n_rows, |i| (i % 2) as f64);
    let x = Array2::from_shape_fn((n_rows, 3), |(r, c)| {
        y[r] * 2.0 + ((r * 7 + c * 13) % 11) as f64 / 5.0
    });
    let ids = Column::new("id".into(), (0..n_rows as i64).map(|i| i + 100).collect::<Vec<_>>());
    let matrix = FeatureMatrix {
        x,
        feature_names: vec!["a".into(), "b".into(), "c".into()],
        ids: Some(ids),
    };
    (matrix, y)
}

fn trained_store(dir: &std::path::Path, matrix: &FeatureMatrix, y: &Array1<f64>) -> DirectoryStore {
    let params = ModelParams {
        lightgbm: LightGBMConfig { n_estimators: 10, min_child_samples: 5, ..Default::default() },
        xgboost: XGBoostConfig { n_estimators: 10, max_depth: 3, ..Default::default() },
        catboost: CatBoostConfig { n_estimators: 10, max_depth: 3, border_count: 16, ..Default::default() },
    };
    let mut store = DirectoryStore::new(dir);
    CrossValTrainer::new(params, CVStrategy::StratifiedKFold { n_splits: 4, shuffle: true }, 42)
        .train_all(matrix, y, &mut store)
        .unwrap();
    store
}

#[test]
fn test_single_weight_equals_scaled_fold_mean() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(40);
    let store = trained_store(dir.path(), &matrix, &y);

    let weights = EnsembleWeights::new([(ModelKind::CatBoost, 0.8)]).unwrap();
    let prediction = EnsembleCombiner::new(weights).combine(&store, &matrix).unwrap();

    let artifacts = store.load(ModelKind::CatBoost).unwrap();
    let mut mean = Array1::<f64>::zeros(matrix.n_rows());
    for artifact in &artifacts {
        mean += &artifact.predict_proba(&matrix.x).unwrap();
    }
    mean /= artifacts.len() as f64;

    for (s, m) in prediction.scores.iter().zip(mean.iter()) {
        assert!((s - 0.8 * m).abs() < 1e-12);
    }
    assert_eq!(prediction.per_model.keys().copied().collect::<Vec<_>>(), vec![ModelKind::CatBoost]);
}

#[test]
fn test_default_weights_combine_all_types() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(40);
    let store = trained_store(dir.path(), &matrix, &y);

    let combiner = EnsembleCombiner::new(EnsembleWeights::default()).with_expected_folds(4);
    let prediction = combiner.combine(&store, &matrix).unwrap();

    let expected: Array1<f64> = prediction
        .per_model
        .iter()
        .map(|(&kind, probs)| probs * combiner.weights().get(kind))
        .fold(Array1::zeros(matrix.n_rows()), |acc, p| acc + p);
    for (s, e) in prediction.scores.iter().zip(expected.iter()) {
        assert!((s - e).abs() < 1e-12);
    }
}

#[test]
fn test_artifacts_survive_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(40);
    let store = trained_store(dir.path(), &matrix, &y);

    let reopened = DirectoryStore::new(dir.path());
    for kind in ModelKind::ALL {
        let a = store.load(kind).unwrap();
        let b = reopened.load(kind).unwrap();
        assert_eq!(a.len(), 4);
        for (x, z) in a.iter().zip(b.iter()) {
            assert_eq!(x.predict_proba(&matrix.x).unwrap(), z.predict_proba(&matrix.x).unwrap());
        }
    }
}

#[test]
fn test_corrupted_artifact_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(40);
    let store = trained_store(dir.path(), &matrix, &y);

    let path = store.path_for(ModelKind::XGBoost, 2);
    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        store.load(ModelKind::XGBoost),
        Err(PipelineError::CorruptArtifact { .. })
    ));
}

#[test]
fn test_renamed_feature_is_a_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(40);
    let store = trained_store(dir.path(), &matrix, &y);

    let mut renamed = matrix.clone();
    renamed.feature_names[2] = "d".into();
    let err = EnsembleCombiner::new(EnsembleWeights::default())
        .combine(&store, &renamed)
        .unwrap_err();
    assert!(matches!(err, PipelineError::FeatureMismatch { .. }));
}

#[test]
fn test_missing_type_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirectoryStore::new(dir.path());
    let err = store.load(ModelKind::LightGBM).unwrap_err();
    assert!(matches!(err, PipelineError::ArtifactsNotFound(_)));
    assert_eq!(err.to_string(), "No saved models found for lightgbm");
}

#[test]
fn test_submission_written_in_row_order() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(20);
    let store = trained_store(dir.path().join("models").as_path(), &matrix, &y);

    let prediction = EnsembleCombiner::new(EnsembleWeights::default())
        .combine(&store, &matrix)
        .unwrap();
    let submission = Submission::from_matrix(&matrix, "diagnosed_diabetes", &prediction.scores).unwrap();
    let path = dir.path().join("submissions").join("submission.csv");
    submission.write_csv(&path).unwrap();

    let loaded = DataLoader::new().load_csv(&path).unwrap();
    assert_eq!(loaded.height(), 20);
    let ids: Vec<i64> = loaded.column("id").unwrap().i64().unwrap().into_no_null_iter().collect();
    assert_eq!(ids, (100..120).collect::<Vec<_>>());
}

#[test]
fn test_artifact_metadata_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let (matrix, y) = fixture(40);
    let store = trained_store(dir.path(), &matrix, &y);
    let artifacts: Vec<ModelArtifact> = store.load(ModelKind::LightGBM).unwrap();
    for (i, artifact) in artifacts.iter().enumerate() {
        assert_eq!(artifact.fold, i + 1);
        assert_eq!(artifact.kind, ModelKind::LightGBM);
        assert!(artifact.validation_auc.map_or(false, |auc| (0.0..=1.0).contains(&auc)));
        assert!(chrono::DateTime::parse_from_rfc3339(&artifact.trained_at).is_ok());
    }
}
