//! Diabetes Ensemble - cross-validated gradient-boosting ensemble
//!
//! The pipeline derives clinical risk features from a patient table, trains
//! LightGBM, XGBoost and CatBoost style classifiers over a shared stratified
//! K-fold partition, persists one artifact per (type, fold) and combines the
//! stored folds into a weighted ensemble score at inference.
//!
//! # Modules
//!
//! ## Core
//! - [`features`] - Feature derivation and matrix construction
//! - [`training`] - Classifiers, fold partitioning, cross-validated training
//! - [`export`] - Fold artifacts and their stores
//! - [`ensemble`] - Weighted fold-averaged inference and submissions
//! - [`evaluation`] - ROC-AUC, average precision, thresholded metrics
//!
//! ## Pipeline
//! - [`ingest`] - Raw data quality checks
//! - [`pipeline`] - Stage functions driven by [`config::PipelineConfig`]
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod features;
pub mod training;
pub mod evaluation;
pub mod export;
pub mod ensemble;

// Pipeline
pub mod ingest;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ErrorCategory, PipelineError, Result};

    // Configuration
    pub use crate::config::{CvConfig, PathsConfig, PipelineConfig};

    // Features
    pub use crate::features::{FeatureDeriver, FeatureMatrix};

    // Training
    pub use crate::training::{
        CVStrategy, Classifier, CrossValTrainer, CrossValidator, ModelKind, ModelParams,
        ProbabilisticClassifier, TrainingReport,
    };

    // Evaluation
    pub use crate::evaluation::{average_precision_score, roc_auc_score, EvaluationReport};

    // Artifacts
    pub use crate::export::{ArtifactStore, DirectoryStore, MemoryStore, ModelArtifact};

    // Ensemble
    pub use crate::ensemble::{EnsembleCombiner, EnsemblePrediction, EnsembleWeights, Submission};

    // Pipeline stages
    pub use crate::ingest::Ingestor;
    pub use crate::pipeline::{run_ensemble, run_ingestion, run_training};
}
