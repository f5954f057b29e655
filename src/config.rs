//! Pipeline configuration
//!
//! Every field defaults to the reference setup, so an empty TOML file is a
//! valid configuration.

use crate::ensemble::EnsembleWeights;
use crate::error::{PipelineError, Result};
use crate::evaluation::DEFAULT_THRESHOLD;
use crate::training::{CVStrategy, ModelKind, ModelParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_TARGET: &str = "diagnosed_diabetes";
pub const DEFAULT_SEED: u64 = 42;

/// Data and artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Holds `raw/` and `processed/`
    pub data_dir: PathBuf,
    /// Holds `models/` and `submissions/`
    pub artifacts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

impl PathsConfig {
    pub fn new(data_dir: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn raw_train(&self) -> PathBuf {
        self.data_dir.join("raw").join("train.csv")
    }

    pub fn raw_test(&self) -> PathBuf {
        self.data_dir.join("raw").join("test.csv")
    }

    pub fn processed_train(&self) -> PathBuf {
        self.data_dir.join("processed").join("train.csv")
    }

    pub fn processed_test(&self) -> PathBuf {
        self.data_dir.join("processed").join("test.csv")
    }

    pub fn model_dir(&self) -> PathBuf {
        self.artifacts_dir.join("models")
    }

    pub fn submission_path(&self) -> PathBuf {
        self.artifacts_dir.join("submissions").join("submission.csv")
    }

    pub fn training_summary_path(&self) -> PathBuf {
        self.model_dir().join("training_summary.json")
    }
}

/// Cross-validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub n_folds: usize,
    pub shuffle: bool,
    pub stratified: bool,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            shuffle: true,
            stratified: true,
        }
    }
}

impl CvConfig {
    pub fn strategy(&self) -> CVStrategy {
        if self.stratified {
            CVStrategy::StratifiedKFold { n_splits: self.n_folds, shuffle: self.shuffle }
        } else {
            CVStrategy::KFold { n_splits: self.n_folds, shuffle: self.shuffle }
        }
    }
}

/// Complete configuration of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub seed: u64,
    pub target_column: String,
    /// Decision threshold for the thresholded evaluation metrics
    pub threshold: f64,
    /// Classifier types trained, in order
    pub model_kinds: Vec<ModelKind>,
    pub paths: PathsConfig,
    pub cv: CvConfig,
    pub ensemble_weights: EnsembleWeights,
    pub models: ModelParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            target_column: DEFAULT_TARGET.to_string(),
            threshold: DEFAULT_THRESHOLD,
            model_kinds: ModelKind::ALL.to_vec(),
            paths: PathsConfig::default(),
            cv: CvConfig::default(),
            ensemble_weights: EnsembleWeights::default(),
            models: ModelParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::MissingFile(path.to_path_buf()));
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::SerializationError(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv.n_folds < 2 {
            return Err(PipelineError::ConfigError(format!(
                "cv.n_folds must be at least 2, got {}",
                self.cv.n_folds
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::ConfigError(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if self.target_column.trim().is_empty() {
            return Err(PipelineError::ConfigError("target_column is empty".to_string()));
        }
        if self.model_kinds.is_empty() {
            return Err(PipelineError::ConfigError("model_kinds is empty".to_string()));
        }
        let unique: BTreeSet<ModelKind> = self.model_kinds.iter().copied().collect();
        if unique.len() != self.model_kinds.len() {
            return Err(PipelineError::ConfigError(
                "model_kinds lists a classifier type twice".to_string(),
            ));
        }
        self.ensemble_weights.validate()?;
        self.models.validate()
    }

    /// Hyperparameters with the global seed filled into unset `random_state`s
    pub fn model_params(&self) -> ModelParams {
        self.models.clone().with_seed(self.seed)
    }

    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.cv.n_folds = n_folds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_weights(mut self, weights: EnsembleWeights) -> Self {
        self.ensemble_weights = weights;
        self
    }

    pub fn with_model_params(mut self, models: ModelParams) -> Self {
        self.models = models;
        self
    }

    pub fn with_paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_model_kinds(mut self, kinds: Vec<ModelKind>) -> Self {
        self.model_kinds = kinds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_reference_config() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.target_column, "diagnosed_diabetes");
        assert_eq!(config.threshold, 0.55);
        assert_eq!(config.cv, CvConfig::default());
        assert_eq!(config.ensemble_weights, EnsembleWeights::default());
        assert_eq!(config.models.lightgbm.n_estimators, 800);
        assert_eq!(config.models.catboost.reg_lambda, 3.0);
        assert_eq!(config.model_kinds, ModelKind::ALL.to_vec());
    }

    #[test]
    fn test_parse_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            seed = 7
            model_kinds = ["xgboost", "catboost"]

            [paths]
            data_dir = "/tmp/d"

            [cv]
            n_folds = 3
            stratified = false

            [ensemble_weights]
            xgboost = 0.4
            catboost = 0.6

            [models.xgboost]
            n_estimators = 50
            max_depth = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.model_kinds, vec![ModelKind::XGBoost, ModelKind::CatBoost]);
        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/d"));
        assert_eq!(config.paths.artifacts_dir, PathBuf::from("artifacts"));
        assert!(matches!(config.cv.strategy(), CVStrategy::KFold { n_splits: 3, shuffle: true }));
        assert_eq!(config.ensemble_weights.get(ModelKind::LightGBM), 0.0);
        assert_eq!(config.models.xgboost.n_estimators, 50);
        assert_eq!(config.models.xgboost.learning_rate, 0.03);
    }

    #[test]
    fn test_seed_propagates_to_unset_random_state() {
        let mut models = ModelParams::default();
        models.catboost.random_state = Some(1);
        let config = PipelineConfig::default().with_seed(9).with_model_params(models);
        let params = config.model_params();
        assert_eq!(params.lightgbm.random_state, Some(9));
        assert_eq!(params.xgboost.random_state, Some(9));
        assert_eq!(params.catboost.random_state, Some(1));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(PipelineConfig::default().with_n_folds(1).validate().is_err());
        assert!(PipelineConfig::from_toml_str("threshold = 1.5").is_err());
        assert!(PipelineConfig::from_toml_str("[ensemble_weights]\nlightgbm = -1.0").is_err());
        assert!(PipelineConfig::from_toml_str("[ensemble_weights]\nforest = 1.0").is_err());
        assert!(PipelineConfig::from_toml_str("model_kinds = [\"xgboost\", \"xgboost\"]").is_err());
        assert!(PipelineConfig::from_toml_str("[models.xgboost]\nsubsample = 0.0").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::default().with_n_folds(4);
        let text = config.to_toml_string().unwrap();
        let parsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.cv.n_folds, 4);
        assert_eq!(parsed.ensemble_weights, config.ensemble_weights);
    }

    #[test]
    fn test_paths_layout() {
        let paths = PathsConfig::new("d", "a");
        assert_eq!(paths.raw_train(), PathBuf::from("d/raw/train.csv"));
        assert_eq!(paths.processed_test(), PathBuf::from("d/processed/test.csv"));
        assert_eq!(paths.model_dir(), PathBuf::from("a/models"));
        assert_eq!(paths.submission_path(), PathBuf::from("a/submissions/submission.csv"));
    }
}
