//! End-to-end pipeline stages driven by a [`PipelineConfig`]

use crate::config::PipelineConfig;
use crate::ensemble::{EnsembleCombiner, EnsemblePrediction, Submission};
use crate::error::Result;
use crate::export::DirectoryStore;
use crate::features::FeatureMatrix;
use crate::ingest::{IngestSummary, Ingestor};
use crate::training::{CrossValTrainer, TrainingReport};
use crate::utils::{atomic_write, DataLoader};
use std::path::PathBuf;
use tracing::info;

/// Outcome of the inference stage
#[derive(Debug, Clone)]
pub struct EnsembleOutput {
    pub prediction: EnsemblePrediction,
    pub submission_path: PathBuf,
    pub rows: usize,
}

/// Quality-check the raw tables and write the processed copies
pub fn run_ingestion(config: &PipelineConfig) -> Result<IngestSummary> {
    config.validate()?;
    Ingestor::new(config.paths.clone(), &config.target_column).run()
}

/// Train every configured type on the processed training table.
///
/// Fold artifacts land in the model directory and the report is written
/// next to them as `training_summary.json`.
pub fn run_training(config: &PipelineConfig) -> Result<TrainingReport> {
    config.validate()?;
    let train = DataLoader::new().load_csv(&config.paths.processed_train())?;
    let (features, labels) = FeatureMatrix::for_training(&train, &config.target_column)?;

    let trainer = CrossValTrainer::new(config.model_params(), config.cv.strategy(), config.seed)
        .with_kinds(config.model_kinds.clone())
        .with_threshold(config.threshold);
    let mut store = DirectoryStore::new(config.paths.model_dir());
    let report = trainer.train_all(&features, &labels, &mut store)?;

    let summary_path = config.paths.training_summary_path();
    atomic_write(&summary_path, serde_json::to_string_pretty(&report)?.as_bytes())?;
    info!(path = %summary_path.display(), "training summary saved");
    Ok(report)
}

/// Score the processed test table with the stored folds and write the submission
pub fn run_ensemble(config: &PipelineConfig) -> Result<EnsembleOutput> {
    config.validate()?;
    let test = DataLoader::new().load_csv(&config.paths.processed_test())?;
    let matrix = FeatureMatrix::for_inference(&test, &config.target_column)?;

    let store = DirectoryStore::new(config.paths.model_dir());
    let prediction = EnsembleCombiner::new(config.ensemble_weights.clone())
        .with_expected_folds(config.cv.n_folds)
        .combine(&store, &matrix)?;

    let submission = Submission::from_matrix(&matrix, &config.target_column, &prediction.scores)?;
    let submission_path = config.paths.submission_path();
    submission.write_csv(&submission_path)?;

    Ok(EnsembleOutput {
        rows: submission.len(),
        prediction,
        submission_path,
    })
}
