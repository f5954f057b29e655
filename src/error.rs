//! Error types for the diabetes ensemble pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse classification of a [`PipelineError`].
///
/// Precondition errors are caller mistakes or missing inputs, fit errors come
/// from a classifier, io errors from reading or writing tables and artifacts.
/// None of them are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Precondition,
    Fit,
    Io,
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Input table is empty: {0}")]
    EmptyInput(String),

    #[error("Missing file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("No saved models found for {0}")]
    ArtifactsNotFound(String),

    #[error("Fold {fold} contains no examples of class {class}")]
    EmptyFoldClass { fold: usize, class: i64 },

    #[error("Feature mismatch for {model} fold {fold}: trained on {expected} columns, got {actual}")]
    FeatureMismatch {
        model: String,
        fold: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Corrupt artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Which part of the taxonomy this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::TrainingError(_) => ErrorCategory::Fit,
            PipelineError::IoError(_)
            | PipelineError::DataError(_)
            | PipelineError::SerializationError(_)
            | PipelineError::CorruptArtifact { .. } => ErrorCategory::Io,
            _ => ErrorCategory::Precondition,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
