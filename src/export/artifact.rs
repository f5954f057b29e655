//! Persisted model artifacts and their on-disk envelope

use crate::error::{PipelineError, Result};
use crate::training::{Classifier, ModelKind, ProbabilisticClassifier};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fitted state of one classifier, keyed by (kind, fold)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: ModelKind,
    /// 1-based fold index
    pub fold: usize,
    /// Column names the classifier was fitted on, in matrix order
    pub feature_names: Vec<String>,
    /// ROC-AUC on the fold's held-out rows
    pub validation_auc: Option<f64>,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    pub classifier: Classifier,
}

impl ModelArtifact {
    pub fn new(fold: usize, feature_names: Vec<String>, classifier: Classifier) -> Self {
        Self {
            kind: classifier.kind(),
            fold,
            feature_names,
            validation_auc: None,
            trained_at: chrono::Utc::now().to_rfc3339(),
            classifier,
        }
    }

    pub fn with_validation_auc(mut self, auc: f64) -> Self {
        self.validation_auc = Some(auc);
        self
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.classifier.predict_proba(x)
    }
}

/// Binary wrapper written to disk around an encoded artifact
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 4],
    format_version: u32,
    payload: Vec<u8>,
    checksum: u64,
}

impl ArtifactEnvelope {
    const MAGIC: [u8; 4] = [b'D', b'B', b'E', b'M'];
    const VERSION: u32 = 1;

    fn new(payload: Vec<u8>) -> Self {
        let checksum = fnv1a(&payload);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            payload,
            checksum,
        }
    }
}

/// FNV-1a over the payload bytes
fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub(crate) fn encode(artifact: &ModelArtifact) -> Result<Vec<u8>> {
    let payload = bincode::serialize(artifact)?;
    Ok(bincode::serialize(&ArtifactEnvelope::new(payload))?)
}

/// Decode an envelope read from `path`; `path` only labels errors
pub(crate) fn decode(bytes: &[u8], path: &Path) -> Result<ModelArtifact> {
    let corrupt = |reason: String| PipelineError::CorruptArtifact {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: ArtifactEnvelope =
        bincode::deserialize(bytes).map_err(|e| corrupt(format!("unreadable envelope: {}", e)))?;

    if envelope.magic != ArtifactEnvelope::MAGIC {
        return Err(corrupt("bad magic bytes".to_string()));
    }
    if envelope.format_version != ArtifactEnvelope::VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            envelope.format_version
        )));
    }
    if fnv1a(&envelope.payload) != envelope.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    bincode::deserialize(&envelope.payload).map_err(|e| corrupt(format!("unreadable payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ModelParams, XGBoostConfig};
    use std::path::PathBuf;

    fn fitted_artifact() -> ModelArtifact {
        let params = ModelParams {
            xgboost: XGBoostConfig { n_estimators: 5, max_depth: 2, ..Default::default() },
            ..Default::default()
        };
        let x = Array2::from_shape_vec((20, 1), (0..20).map(|i| i as f64).collect()).unwrap();
        let y = Array1::from_vec((0..20).map(|i| if i < 10 { 0.0 } else { 1.0 }).collect());
        let mut classifier = params.build(ModelKind::XGBoost);
        classifier.fit(&x, &y).unwrap();
        ModelArtifact::new(3, vec!["age".to_string()], classifier).with_validation_auc(0.9)
    }

    #[test]
    fn test_envelope_round_trip_keeps_predictions() {
        let artifact = fitted_artifact();
        let bytes = encode(&artifact).unwrap();
        let decoded = decode(&bytes, &PathBuf::from("mem")).unwrap();

        assert_eq!(decoded.kind, ModelKind::XGBoost);
        assert_eq!(decoded.fold, 3);
        assert_eq!(decoded.feature_names, vec!["age".to_string()]);
        assert_eq!(decoded.validation_auc, Some(0.9));

        let x = Array2::from_shape_vec((3, 1), vec![1.0, 9.5, 18.0]).unwrap();
        assert_eq!(artifact.predict_proba(&x).unwrap(), decoded.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_flipped_payload_byte_is_rejected() {
        let mut bytes = encode(&fitted_artifact()).unwrap();
        let last = bytes.len() - 20;
        bytes[last] ^= 0xFF;
        let err = decode(&bytes, &PathBuf::from("mem")).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptArtifact { .. }), "{:?}", err);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = encode(&fitted_artifact()).unwrap();
        let err = decode(&bytes[..10], &PathBuf::from("mem")).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptArtifact { .. }));
    }
}
