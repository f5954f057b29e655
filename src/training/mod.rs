//! Model training module
//!
//! Provides the three gradient-boosting families used by the ensemble:
//! - LightGBM-style leaf-wise boosting with optional GOSS
//! - XGBoost-style level-wise boosting with second-order gains
//! - CatBoost-style boosting on symmetric (oblivious) trees
//!
//! plus stratified K-fold splitting and the cross-validated trainer that
//! persists one artifact per (classifier type, fold).

mod classifier;
mod engine;
pub mod catboost;
pub mod cross_validation;
pub mod lightgbm;
pub mod xgboost;

pub use catboost::{CatBoostClassifier, CatBoostConfig};
pub use classifier::{Classifier, ModelKind, ModelParams, ProbabilisticClassifier};
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use engine::{CrossValTrainer, ModelCvResult, TrainingReport};
pub use lightgbm::{GossConfig, LightGBMClassifier, LightGBMConfig};
pub use xgboost::{XGBoostClassifier, XGBoostConfig};
