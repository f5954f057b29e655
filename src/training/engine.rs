//! Cross-validated training of every classifier type

use super::classifier::{ModelKind, ModelParams, ProbabilisticClassifier};
use super::cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
use crate::error::{PipelineError, Result};
use crate::evaluation::{roc_auc_score, EvaluationReport, DEFAULT_THRESHOLD};
use crate::export::{ArtifactStore, ModelArtifact};
use crate::features::FeatureMatrix;
use ndarray::{Array1, Axis};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of K-fold training for one classifier type
#[derive(Debug, Clone, Serialize)]
pub struct ModelCvResult {
    pub kind: ModelKind,
    /// Per-fold validation ROC-AUC with mean and population std
    pub cv: CVResults,
    /// Metrics of the out-of-fold vector as a whole
    pub oof_report: EvaluationReport,
    pub training_time_secs: f64,
    /// One held-out prediction per training row
    #[serde(skip)]
    pub oof: Array1<f64>,
}

/// Summary of a full training run, written as `training_summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub n_rows: usize,
    pub n_features: usize,
    pub n_folds: usize,
    pub feature_names: Vec<String>,
    pub models: Vec<ModelCvResult>,
    pub completed_at: String,
}

impl TrainingReport {
    pub fn model(&self, kind: ModelKind) -> Option<&ModelCvResult> {
        self.models.iter().find(|m| m.kind == kind)
    }
}

/// Trains K fold models per classifier type and persists each one
pub struct CrossValTrainer {
    params: ModelParams,
    kinds: Vec<ModelKind>,
    strategy: CVStrategy,
    seed: u64,
    threshold: f64,
}

impl CrossValTrainer {
    pub fn new(params: ModelParams, strategy: CVStrategy, seed: u64) -> Self {
        Self {
            params,
            kinds: ModelKind::ALL.to_vec(),
            strategy,
            seed,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Classifier types to train, in order
    pub fn with_kinds(mut self, kinds: Vec<ModelKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Decision threshold for the out-of-fold report
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn n_folds(&self) -> usize {
        self.strategy.n_splits()
    }

    /// Fold assignment shared by every classifier type.
    ///
    /// Fails before any fitting when the labels hold a single class or a
    /// validation fold misses a class.
    pub fn partition(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let classes: BTreeSet<i64> = y.iter().map(|v| v.round() as i64).collect();
        if classes.len() < 2 {
            return Err(PipelineError::ValidationError(
                "training labels contain a single class".to_string(),
            ));
        }

        let splits = CrossValidator::new(self.strategy.clone())
            .with_random_state(self.seed)
            .split(y.len(), Some(y))?;

        for split in &splits {
            let present: BTreeSet<i64> = split
                .test_indices
                .iter()
                .map(|&i| y[i].round() as i64)
                .collect();
            if let Some(&class) = classes.difference(&present).next() {
                return Err(PipelineError::EmptyFoldClass {
                    fold: split.fold_idx + 1,
                    class,
                });
            }
        }
        Ok(splits)
    }

    /// Train every configured type over one shared partition
    pub fn train_all<S: ArtifactStore + ?Sized>(
        &self,
        features: &FeatureMatrix,
        y: &Array1<f64>,
        store: &mut S,
    ) -> Result<TrainingReport> {
        if features.n_rows() == 0 {
            return Err(PipelineError::EmptyInput("training matrix has no rows".to_string()));
        }
        if features.n_rows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", features.n_rows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let splits = self.partition(y)?;
        info!(
            rows = features.n_rows(),
            features = features.n_features(),
            folds = splits.len(),
            "starting cross-validated training"
        );

        let models = self
            .kinds
            .iter()
            .map(|&kind| self.train_model(kind, features, y, &splits, store))
            .collect::<Result<Vec<_>>>()?;

        Ok(TrainingReport {
            n_rows: features.n_rows(),
            n_features: features.n_features(),
            n_folds: splits.len(),
            feature_names: features.feature_names.clone(),
            models,
            completed_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// K-fold training of one type; saves fold artifacts 1..=K and prunes older ones.
    ///
    /// Nothing is written until every fold has fitted, so a failing fold
    /// leaves the previous run of this type untouched.
    pub fn train_model<S: ArtifactStore + ?Sized>(
        &self,
        kind: ModelKind,
        features: &FeatureMatrix,
        y: &Array1<f64>,
        splits: &[CVSplit],
        store: &mut S,
    ) -> Result<ModelCvResult> {
        let start = Instant::now();
        let mut oof: Vec<Option<f64>> = vec![None; y.len()];
        let mut fold_scores = Vec::with_capacity(splits.len());
        let mut staged = Vec::with_capacity(splits.len());

        for split in splits {
            let fold = split.fold_idx + 1;
            let x_train = features.x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_val = features.x.select(Axis(0), &split.test_indices);
            let y_val = y.select(Axis(0), &split.test_indices);

            let mut classifier = self.params.build(kind);
            classifier.fit(&x_train, &y_train)?;
            let probs = classifier.predict_proba(&x_val)?;

            for (&row, &p) in split.test_indices.iter().zip(probs.iter()) {
                oof[row] = Some(p);
            }

            let auc = roc_auc_score(&y_val, &probs)?;
            fold_scores.push(auc);

            staged.push(
                ModelArtifact::new(fold, features.feature_names.clone(), classifier)
                    .with_validation_auc(auc),
            );
            info!(model = %kind, fold, auc = %format!("{:.5}", auc), "fold trained");
        }

        let oof = oof
            .into_iter()
            .enumerate()
            .map(|(row, p)| {
                p.ok_or_else(|| {
                    PipelineError::TrainingError(format!(
                        "row {} received no out-of-fold prediction",
                        row
                    ))
                })
            })
            .collect::<Result<Array1<f64>>>()?;
        commit_artifacts(store, kind, &staged)?;

        let cv = CVResults::from_scores(fold_scores);
        let oof_report = EvaluationReport::evaluate(y, &oof, self.threshold)?;
        info!(
            model = %kind,
            mean_auc = %format!("{:.5}", cv.mean_score),
            std_auc = %format!("{:.5}", cv.std_score),
            oof_auc = %format!("{:.5}", oof_report.roc_auc),
            "cross-validation complete"
        );

        Ok(ModelCvResult {
            kind,
            cv,
            oof_report,
            training_time_secs: start.elapsed().as_secs_f64(),
            oof,
        })
    }
}

/// Replace every stored fold of `kind` with `staged`.
///
/// When a save fails midway the previously stored folds are written back, so
/// the store never mixes two runs of one type.
fn commit_artifacts<S: ArtifactStore + ?Sized>(
    store: &mut S,
    kind: ModelKind,
    staged: &[ModelArtifact],
) -> Result<()> {
    let previous = if store.folds(kind)?.is_empty() {
        Vec::new()
    } else {
        store.load(kind)?
    };

    for artifact in staged {
        if let Err(err) = store.save(artifact) {
            warn!(model = %kind, fold = artifact.fold, error = %err, "save failed, restoring previous folds");
            if let Err(restore_err) = restore_artifacts(store, kind, &previous) {
                warn!(model = %kind, error = %restore_err, "could not restore previous folds");
            }
            return Err(err);
        }
    }

    let removed = store.retain_folds(kind, staged.len())?;
    if removed > 0 {
        debug!(model = %kind, removed, "pruned stale fold artifacts");
    }
    Ok(())
}

fn restore_artifacts<S: ArtifactStore + ?Sized>(
    store: &mut S,
    kind: ModelKind,
    previous: &[ModelArtifact],
) -> Result<()> {
    store.retain_folds(kind, 0)?;
    for artifact in previous {
        store.save(artifact)?;
    }
    Ok(())
}
