//! Two-column submission table

use crate::error::{PipelineError, Result};
use crate::features::FeatureMatrix;
use crate::utils::DataSaver;
use ndarray::Array1;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Header of the identifier column in every submission
pub const SUBMISSION_ID_COLUMN: &str = "id";

/// Identifier and ensemble score per input row, in input order
#[derive(Debug, Clone)]
pub struct Submission {
    frame: DataFrame,
}

impl Submission {
    pub fn new(ids: &Column, target: &str, scores: &Array1<f64>) -> Result<Self> {
        if ids.len() != scores.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} scores", ids.len()),
                actual: format!("{} scores", scores.len()),
            });
        }
        let frame = DataFrame::new(vec![
            ids.clone().with_name(SUBMISSION_ID_COLUMN.into()),
            Column::new(target.into(), scores.to_vec()),
        ])?;
        Ok(Self { frame })
    }

    /// Submission for the rows of `matrix`, which must carry identifiers
    pub fn from_matrix(matrix: &FeatureMatrix, target: &str, scores: &Array1<f64>) -> Result<Self> {
        let ids = matrix
            .ids
            .as_ref()
            .ok_or_else(|| PipelineError::MissingColumn(SUBMISSION_ID_COLUMN.to_string()))?;
        Self::new(ids, target, scores)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Write as CSV through a temporary file and a rename
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut frame = self.frame.clone();
        DataSaver::save_csv(&mut frame, path)?;
        info!(path = %path.display(), rows = self.len(), "submission saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::DataLoader;
    use ndarray::array;

    #[test]
    fn test_submission_columns_and_order() {
        let ids = Column::new("patient_id".into(), &[7i64, 3, 9]);
        let sub = Submission::new(&ids, "diagnosed_diabetes", &array![0.2, 0.9, 0.5]).unwrap();
        let names: Vec<&str> = sub.frame().get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["id", "diagnosed_diabetes"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submission.csv");
        sub.write_csv(&path).unwrap();

        let loaded = DataLoader::new().load_csv(&path).unwrap();
        let ids: Vec<i64> = loaded.column("id").unwrap().i64().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec![7, 3, 9]);
        let scores: Vec<f64> = loaded
            .column("diagnosed_diabetes")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(scores, vec![0.2, 0.9, 0.5]);
    }

    #[test]
    fn test_length_mismatch() {
        let ids = Column::new("id".into(), &[1i64, 2]);
        assert!(matches!(
            Submission::new(&ids, "diagnosed_diabetes", &array![0.5]),
            Err(PipelineError::ShapeError { .. })
        ));
    }
}
