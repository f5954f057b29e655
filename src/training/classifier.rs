//! Classifier adapter
//!
//! The three boosting families share exactly two operations, `fit` and
//! `predict_proba`. [`Classifier`] is the tagged variant that gets persisted
//! as an artifact; [`ModelParams`] holds the frozen hyperparameters for each
//! [`ModelKind`] and builds fresh, unfitted instances from them.

use super::catboost::{CatBoostClassifier, CatBoostConfig};
use super::lightgbm::{LightGBMClassifier, LightGBMConfig};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier family, also the artifact namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    LightGBM,
    XGBoost,
    CatBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::LightGBM, ModelKind::XGBoost, ModelKind::CatBoost];

    /// Stable name used in artifact paths and configuration keys
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LightGBM => "lightgbm",
            ModelKind::XGBoost => "xgboost",
            ModelKind::CatBoost => "catboost",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lightgbm" | "lgbm" => Ok(ModelKind::LightGBM),
            "xgboost" | "xgb" => Ok(ModelKind::XGBoost),
            "catboost" | "cat" => Ok(ModelKind::CatBoost),
            other => Err(PipelineError::ConfigError(format!(
                "unknown classifier type '{}'",
                other
            ))),
        }
    }
}

/// Capability shared by every classifier family
pub trait ProbabilisticClassifier {
    /// Fit on features `x` and binary labels `y` (0.0 / 1.0)
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class for every row of `x`
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;
}

/// One classifier instance of any family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Classifier {
    LightGBM(LightGBMClassifier),
    XGBoost(XGBoostClassifier),
    CatBoost(CatBoostClassifier),
}

impl Classifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::LightGBM(_) => ModelKind::LightGBM,
            Classifier::XGBoost(_) => ModelKind::XGBoost,
            Classifier::CatBoost(_) => ModelKind::CatBoost,
        }
    }
}

impl ProbabilisticClassifier for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Classifier::LightGBM(m) => m.fit(x, y),
            Classifier::XGBoost(m) => m.fit(x, y),
            Classifier::CatBoost(m) => m.fit(x, y),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::LightGBM(m) => m.predict_proba(x),
            Classifier::XGBoost(m) => m.predict_proba(x),
            Classifier::CatBoost(m) => m.predict_proba(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Classifier::LightGBM(m) => m.is_fitted(),
            Classifier::XGBoost(m) => m.is_fitted(),
            Classifier::CatBoost(m) => m.is_fitted(),
        }
    }
}

/// Fixed hyperparameters for each classifier type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub lightgbm: LightGBMConfig,
    pub xgboost: XGBoostConfig,
    pub catboost: CatBoostConfig,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            lightgbm: LightGBMConfig {
                n_estimators: 800,
                learning_rate: 0.03,
                max_depth: None,
                subsample: 0.9,
                colsample_bytree: 0.8,
                ..Default::default()
            },
            xgboost: XGBoostConfig {
                n_estimators: 800,
                learning_rate: 0.03,
                max_depth: 6,
                subsample: 0.9,
                colsample_bytree: 0.8,
                ..Default::default()
            },
            catboost: CatBoostConfig {
                n_estimators: 800,
                learning_rate: 0.03,
                max_depth: 6,
                ..Default::default()
            },
        }
    }
}

impl ModelParams {
    /// Fill `random_state` with `seed` wherever it was left unset
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.lightgbm.random_state.get_or_insert(seed);
        self.xgboost.random_state.get_or_insert(seed);
        self.catboost.random_state.get_or_insert(seed);
        self
    }

    /// Fresh, unfitted classifier of the given type
    pub fn build(&self, kind: ModelKind) -> Classifier {
        match kind {
            ModelKind::LightGBM => Classifier::LightGBM(LightGBMClassifier::new(self.lightgbm.clone())),
            ModelKind::XGBoost => Classifier::XGBoost(XGBoostClassifier::new(self.xgboost.clone())),
            ModelKind::CatBoost => Classifier::CatBoost(CatBoostClassifier::new(self.catboost.clone())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.lightgbm.validate()?;
        self.xgboost.validate()?;
        self.catboost.validate()
    }
}

// ─── Shared helpers for the boosting families ──────────────────────────────

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Log-odds of the positive class, the starting raw score of every booster
pub(crate) fn log_odds_prior(y: &Array1<f64>) -> f64 {
    let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
    (p / (1.0 - p)).ln()
}

/// Reject inputs no booster can learn from
pub(crate) fn validate_binary_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::TrainingError("Empty dataset".into()));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::ValidationError(format!(
            "labels must be 0 or 1, found {}",
            bad
        )));
    }
    let positives = y.iter().filter(|&&v| v == 1.0).count();
    if positives == 0 || positives == y.len() {
        return Err(PipelineError::TrainingError(
            "training labels contain a single class".into(),
        ));
    }
    Ok(())
}

pub(crate) fn check_feature_count(expected: Option<usize>, x: &Array2<f64>) -> Result<()> {
    let expected = expected.ok_or(PipelineError::ModelNotFitted)?;
    if x.ncols() != expected {
        return Err(PipelineError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

pub(crate) fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(PipelineError::ConfigError(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
