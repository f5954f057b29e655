//! Raw data ingestion and basic quality checks

use crate::config::PathsConfig;
use crate::error::{PipelineError, Result};
use crate::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use tracing::info;

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub duplicates_dropped: usize,
}

/// Loads `raw/{train,test}.csv`, checks them and writes `processed/`
pub struct Ingestor {
    paths: PathsConfig,
    target: String,
    loader: DataLoader,
}

impl Ingestor {
    pub fn new(paths: PathsConfig, target: impl Into<String>) -> Self {
        Self {
            paths,
            target: target.into(),
            loader: DataLoader::new(),
        }
    }

    pub fn run(&self) -> Result<IngestSummary> {
        info!(data_dir = %self.paths.data_dir.display(), "loading raw data");
        let train = self.loader.load_csv(&self.paths.raw_train())?;
        let test = self.loader.load_csv(&self.paths.raw_test())?;

        let (mut train, mut test, duplicates_dropped) = self.quality_check(train, test)?;

        DataSaver::save_csv(&mut train, &self.paths.processed_train())?;
        DataSaver::save_csv(&mut test, &self.paths.processed_test())?;
        info!(
            train = %self.paths.processed_train().display(),
            test = %self.paths.processed_test().display(),
            "processed data saved"
        );

        Ok(IngestSummary {
            train_rows: train.height(),
            test_rows: test.height(),
            duplicates_dropped,
        })
    }

    /// Non-empty tables, label column in train, exact duplicate train rows removed
    pub fn quality_check(
        &self,
        train: DataFrame,
        test: DataFrame,
    ) -> Result<(DataFrame, DataFrame, usize)> {
        if train.height() == 0 {
            return Err(PipelineError::EmptyInput("training table is empty".to_string()));
        }
        if test.height() == 0 {
            return Err(PipelineError::EmptyInput("test table is empty".to_string()));
        }
        if train.column(&self.target).is_err() {
            return Err(PipelineError::MissingColumn(self.target.clone()));
        }

        let before = train.height();
        let train = drop_duplicate_rows(&train)?;
        let dropped = before - train.height();
        if dropped > 0 {
            info!(dropped, "removed duplicate training rows");
        }
        Ok((train, test, dropped))
    }
}

/// Keep the first occurrence of every distinct row, preserving order
pub fn drop_duplicate_rows(df: &DataFrame) -> Result<DataFrame> {
    Ok(df.unique_stable(None, UniqueKeepStrategy::First, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &std::path::Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_drop_duplicate_rows_keeps_first_in_order() {
        let df = df! {
            "id" => [1i64, 2, 1, 3, 2],
            "age" => [40.0, 50.0, 40.0, 60.0, 51.0],
        }
        .unwrap();
        let out = drop_duplicate_rows(&df).unwrap();
        let ids: Vec<i64> = out.column("id").unwrap().i64().unwrap().into_no_null_iter().collect();
        assert_eq!(ids, vec![1, 2, 3, 2]);
    }

    #[test]
    fn test_run_writes_processed_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathsConfig::new(dir.path().join("data"), dir.path().join("artifacts"));
        write(
            &paths.raw_train(),
            "id,age,diagnosed_diabetes\n1,40,0\n2,55,1\n1,40,0\n",
        );
        write(&paths.raw_test(), "id,age\n3,61\n");

        let summary = Ingestor::new(paths.clone(), "diagnosed_diabetes").run().unwrap();
        assert_eq!(summary, IngestSummary { train_rows: 2, test_rows: 1, duplicates_dropped: 1 });

        let train = DataLoader::new().load_csv(&paths.processed_train()).unwrap();
        assert_eq!(train.height(), 2);
        assert!(paths.processed_test().is_file());
    }

    #[test]
    fn test_missing_raw_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathsConfig::new(dir.path(), dir.path());
        write(&paths.raw_train(), "id,diagnosed_diabetes\n1,0\n");
        let err = Ingestor::new(paths, "diagnosed_diabetes").run().unwrap_err();
        assert!(matches!(err, PipelineError::MissingFile(ref p) if p.ends_with("raw/test.csv")));
    }

    #[test]
    fn test_quality_check_preconditions() {
        let ingestor = Ingestor::new(PathsConfig::default(), "diagnosed_diabetes");
        let train = df! { "id" => [1i64], "age" => [30.0] }.unwrap();
        let test = df! { "id" => [2i64], "age" => [31.0] }.unwrap();
        assert!(matches!(
            ingestor.quality_check(train.clone(), test.clone()),
            Err(PipelineError::MissingColumn(_))
        ));
        assert!(matches!(
            ingestor.quality_check(train, test.head(Some(0))),
            Err(PipelineError::EmptyInput(_))
        ));
    }
}
