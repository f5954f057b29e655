//! Integration tests for feature derivation and the feature matrix

use diabetes_ensemble::error::PipelineError;
use diabetes_ensemble::features::{FeatureDeriver, FeatureMatrix, DERIVED_COLUMNS};
use polars::prelude::*;

fn column(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name).unwrap().f64().unwrap().into_no_null_iter().collect()
}

fn full_profile() -> DataFrame {
    df!(
        "id" => &[1i64, 2, 3],
        "age" => &[50.0, 61.0, 38.0],
        "bmi" => &[31.0, 27.5, 22.0],
        "systolic_bp" => &[145.0, 130.0, 118.0],
        "diastolic_bp" => &[92.0, 85.0, 76.0],
        "heart_rate" => &[72.0, 80.0, 64.0],
        "cholesterol" => &[220.0, 190.0, 170.0],
        "ldl" => &[140.0, 120.0, 100.0],
        "hdl" => &[40.0, 50.0, 60.0],
        "triglycerides" => &[180.0, 150.0, 110.0],
        "physical_activity" => &[60.0, 120.0, 200.0],
        "screen_time" => &[6.0, 4.0, 2.0],
        "family_history" => &[1.0, 0.0, 1.0],
        "diagnosed_diabetes" => &[1i64, 0, 0],
    )
    .unwrap()
}

#[test]
fn test_derive_is_deterministic() {
    let df = full_profile();
    let deriver = FeatureDeriver::new();
    let a = deriver.derive(&df).unwrap();
    let b = deriver.derive(&df).unwrap();
    assert!(a.equals(&b));
    for name in DERIVED_COLUMNS {
        assert!(a.column(name).is_ok(), "missing {}", name);
    }
}

#[test]
fn test_cardiovascular_values() {
    let out = FeatureDeriver::new().derive(&full_profile()).unwrap();
    assert_eq!(column(&out, "pulse_pressure")[0], 53.0);
    assert!((column(&out, "mean_arterial_pressure")[0] - 109.666_666_666_666_67).abs() < 1e-9);
    assert_eq!(column(&out, "rate_pressure_product")[1], 80.0 * 130.0);
}

#[test]
fn test_absent_lipids_zero_the_whole_group() {
    let df = full_profile().drop("triglycerides").unwrap();
    let out = FeatureDeriver::new().derive(&df).unwrap();
    for name in [
        "ldl_hdl_ratio",
        "chol_hdl_ratio",
        "non_hdl_cholesterol",
        "ldl_share",
        "tg_hdl_ratio",
        "lipid_sum",
        "lipid_burden",
    ] {
        assert!(column(&out, name).iter().all(|&v| v == 0.0), "{} not zero", name);
    }
}

#[test]
fn test_training_matrix_excludes_id_and_label() {
    let (matrix, y) = FeatureMatrix::for_training(&full_profile(), "diagnosed_diabetes").unwrap();
    assert_eq!(y.to_vec(), vec![1.0, 0.0, 0.0]);
    assert!(!matrix.feature_names.iter().any(|n| n == "id" || n == "diagnosed_diabetes"));
    assert_eq!(matrix.n_features(), 12 + DERIVED_COLUMNS.len());
    assert_eq!(matrix.ids.as_ref().map(|c| c.len()), Some(3));
}

#[test]
fn test_inference_matrix_matches_training_columns() {
    let train = full_profile();
    let test = train.drop("diagnosed_diabetes").unwrap();
    let (train_matrix, _) = FeatureMatrix::for_training(&train, "diagnosed_diabetes").unwrap();
    let test_matrix = FeatureMatrix::for_inference(&test, "diagnosed_diabetes").unwrap();
    assert_eq!(train_matrix.feature_names, test_matrix.feature_names);
    assert_eq!(train_matrix.x, test_matrix.x);
}

#[test]
fn test_missing_label_column() {
    let df = full_profile().drop("diagnosed_diabetes").unwrap();
    assert!(matches!(
        FeatureMatrix::for_training(&df, "diagnosed_diabetes"),
        Err(PipelineError::MissingColumn(_))
    ));
}
