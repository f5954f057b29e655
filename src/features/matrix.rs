//! Column selection and conversion to a dense feature matrix

use super::FeatureDeriver;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::warn;

/// Identifier columns carried through but never used as features
pub const ID_ALIASES: [&str; 3] = ["id", "ID", "patient_id"];

/// Feature columns of `df` in table order: everything except identifier
/// aliases and `target`
pub fn feature_columns(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .filter(|name| name != target && !ID_ALIASES.contains(&name.as_str()))
        .collect()
}

/// Row-major numeric features plus the identifiers of their rows
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub x: Array2<f64>,
    pub feature_names: Vec<String>,
    /// First identifier alias present in the input, in row order
    pub ids: Option<Column>,
}

impl FeatureMatrix {
    /// Derive features for a labelled table and split off the label column
    pub fn for_training(df: &DataFrame, target: &str) -> Result<(Self, Array1<f64>)> {
        if df.height() == 0 {
            return Err(PipelineError::EmptyInput("training table has no rows".to_string()));
        }
        let labels = extract_labels(df, target)?;
        let matrix = Self::build(df, target)?;
        Ok((matrix, labels))
    }

    /// Derive features for an unlabelled table; a label column, if present, is ignored
    pub fn for_inference(df: &DataFrame, target: &str) -> Result<Self> {
        if df.height() == 0 {
            return Err(PipelineError::EmptyInput("inference table has no rows".to_string()));
        }
        Self::build(df, target)
    }

    fn build(df: &DataFrame, target: &str) -> Result<Self> {
        let ids = ID_ALIASES
            .iter()
            .find_map(|alias| df.column(alias).ok().cloned());
        let derived = FeatureDeriver::new().derive(df)?;
        let feature_names = feature_columns(&derived, target);
        let x = columns_to_array2(&derived, &feature_names)?;
        Ok(Self { x, feature_names, ids })
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Binary labels read from the untouched input column
fn extract_labels(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let column = df
        .column(target)
        .map_err(|_| PipelineError::MissingColumn(target.to_string()))?;
    let cast = column.cast(&DataType::Float64)?;
    cast.f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if v == 0.0 || v == 1.0 => Ok(v),
            Some(v) => Err(PipelineError::ValidationError(format!(
                "label {} in row {} is not 0 or 1",
                v, row
            ))),
            None => Err(PipelineError::ValidationError(format!(
                "label missing in row {}",
                row
            ))),
        })
        .collect()
}

/// True when `source` held values but none of them survived the cast
fn lost_in_cast(source: &Column, cast: &Column) -> bool {
    source.null_count() < source.len() && cast.null_count() == cast.len()
}

/// Extract named columns from a DataFrame into a row-major Array2<f64>.
/// Cells that do not cast to a number become 0.
pub(crate) fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    // Collect all columns as contiguous f64 Vecs
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::MissingColumn(col_name.clone()))?;
            let cast = column.cast(&DataType::Float64)?;
            if lost_in_cast(column, &cast) {
                warn!(
                    column = %col_name,
                    dtype = %column.dtype(),
                    "no value is numeric, column becomes all zeros"
                );
            }
            let values: Vec<f64> = cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|v| v.is_finite()).unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}
