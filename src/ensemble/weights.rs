//! Per-type ensemble weights

use crate::error::{PipelineError, Result};
use crate::training::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar applied to each type's fold-averaged probability.
///
/// Weights are used exactly as given; they are not normalised to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct EnsembleWeights {
    weights: BTreeMap<ModelKind, f64>,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                (ModelKind::LightGBM, 0.25),
                (ModelKind::XGBoost, 0.30),
                (ModelKind::CatBoost, 0.45),
            ]),
        }
    }
}

impl EnsembleWeights {
    /// Build from explicit pairs, validating every weight
    pub fn new(pairs: impl IntoIterator<Item = (ModelKind, f64)>) -> Result<Self> {
        let weights = Self {
            weights: pairs.into_iter().collect(),
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Every weight finite and non-negative, at least one positive
    pub fn validate(&self) -> Result<()> {
        for (kind, &w) in &self.weights {
            if !w.is_finite() || w < 0.0 {
                return Err(PipelineError::ConfigError(format!(
                    "ensemble weight for {} must be finite and >= 0, got {}",
                    kind, w
                )));
            }
        }
        if !self.weights.values().any(|&w| w > 0.0) {
            return Err(PipelineError::ConfigError(
                "at least one ensemble weight must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, kind: ModelKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    /// Types with a positive weight, in type order
    pub fn active(&self) -> impl Iterator<Item = (ModelKind, f64)> + '_ {
        self.weights
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(&k, &w)| (k, w))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, f64)> + '_ {
        self.weights.iter().map(|(&k, &w)| (k, w))
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}

impl TryFrom<BTreeMap<String, f64>> for EnsembleWeights {
    type Error = PipelineError;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        let pairs = raw
            .into_iter()
            .map(|(name, w)| Ok((name.parse::<ModelKind>()?, w)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(pairs)
    }
}

impl From<EnsembleWeights> for BTreeMap<String, f64> {
    fn from(weights: EnsembleWeights) -> Self {
        weights
            .weights
            .into_iter()
            .map(|(k, w)| (k.name().to_string(), w))
            .collect()
    }
}
