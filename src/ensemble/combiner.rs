//! Fold-averaged, weighted combination of the persisted classifiers

use super::weights::EnsembleWeights;
use crate::error::{PipelineError, Result};
use crate::export::{ArtifactStore, ModelArtifact};
use crate::features::FeatureMatrix;
use crate::training::ModelKind;
use ndarray::Array1;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Combined scores plus the fold-averaged probabilities of each type
#[derive(Debug, Clone)]
pub struct EnsemblePrediction {
    pub scores: Array1<f64>,
    pub per_model: BTreeMap<ModelKind, Array1<f64>>,
}

/// Weighted sum over types of the mean probability across each type's folds
pub struct EnsembleCombiner {
    weights: EnsembleWeights,
    expected_folds: Option<usize>,
}

impl EnsembleCombiner {
    pub fn new(weights: EnsembleWeights) -> Self {
        Self {
            weights,
            expected_folds: None,
        }
    }

    /// Warn when a type has a different number of stored folds
    pub fn with_expected_folds(mut self, n_folds: usize) -> Self {
        self.expected_folds = Some(n_folds);
        self
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    pub fn combine<S: ArtifactStore + ?Sized>(
        &self,
        store: &S,
        matrix: &FeatureMatrix,
    ) -> Result<EnsemblePrediction> {
        let mut scores = Array1::<f64>::zeros(matrix.n_rows());
        let mut per_model = BTreeMap::new();

        for (kind, weight) in self.weights.active() {
            info!(model = %kind, weight, "scoring with saved folds");
            let probs = self.predict_kind(store, kind, matrix)?;
            scores.scaled_add(weight, &probs);
            per_model.insert(kind, probs);
        }

        Ok(EnsemblePrediction { scores, per_model })
    }

    /// Equal-weight mean of every stored fold of `kind`
    pub fn predict_kind<S: ArtifactStore + ?Sized>(
        &self,
        store: &S,
        kind: ModelKind,
        matrix: &FeatureMatrix,
    ) -> Result<Array1<f64>> {
        let artifacts = store.load(kind)?;
        if let Some(expected) = self.expected_folds {
            if artifacts.len() != expected {
                warn!(
                    model = %kind,
                    found = artifacts.len(),
                    expected,
                    "stored fold count differs from configuration"
                );
            }
        }

        let mut sum = Array1::<f64>::zeros(matrix.n_rows());
        for artifact in &artifacts {
            check_features(artifact, matrix)?;
            sum += &artifact.predict_proba(&matrix.x)?;
        }
        Ok(sum / artifacts.len() as f64)
    }
}

fn check_features(artifact: &ModelArtifact, matrix: &FeatureMatrix) -> Result<()> {
    if artifact.feature_names != matrix.feature_names {
        return Err(PipelineError::FeatureMismatch {
            model: artifact.kind.to_string(),
            fold: artifact.fold,
            expected: artifact.feature_names.len(),
            actual: matrix.feature_names.len(),
        });
    }
    Ok(())
}
