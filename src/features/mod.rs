//! Clinical feature derivation
//!
//! [`FeatureDeriver`] appends engineered columns to a patient table. Each
//! derived group is all-or-nothing on column presence: when any raw
//! dependency is missing from the table, every column of the group is filled
//! with zeros. A present column with a null cell propagates the null through
//! the arithmetic, and the terminal cleanup turns it into 0 like any other
//! missing or non-finite value.

mod matrix;

pub use matrix::{feature_columns, FeatureMatrix, ID_ALIASES};

use crate::error::Result;
use polars::prelude::*;
use tracing::debug;

/// Guard added to every derived denominator
pub const EPSILON: f64 = 1e-6;

type Values = Vec<Option<f64>>;

/// Derived columns in the order they are appended
pub const DERIVED_COLUMNS: [&str; 19] = [
    "pulse_pressure",
    "pulse_pressure_ratio",
    "mean_arterial_pressure",
    "rate_pressure_product",
    "ldl_hdl_ratio",
    "chol_hdl_ratio",
    "non_hdl_cholesterol",
    "ldl_share",
    "tg_hdl_ratio",
    "lipid_sum",
    "lipid_burden",
    "age_bmi_risk",
    "activity_age_ratio",
    "activity_x_age",
    "screen_activity_ratio",
    "lifestyle_risk_score",
    "risk_history",
    "genetic_history_risk",
    "age_map_risk",
];

/// Adds engineered risk features to a patient table
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Return a new table with every derived column appended, then cleaned.
    ///
    /// A derived column that already exists in `df` is replaced in place.
    pub fn derive(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut frame = DerivationFrame::new(df);

        // Cardiovascular
        let sys = frame.raw("systolic_bp");
        let dia = frame.raw("diastolic_bp");
        let map = match (&sys, &dia) {
            (Some(sys), Some(dia)) => {
                let pp = zip_with(sys, dia, |s, d| s - d);
                let ppr = zip_with(&pp, sys, |p, s| p / (s + EPSILON));
                let map = zip_with(sys, dia, |s, d| (s + 2.0 * d) / 3.0);
                frame.push("pulse_pressure", pp);
                frame.push("pulse_pressure_ratio", ppr);
                frame.push("mean_arterial_pressure", map.clone());
                map
            }
            _ => {
                frame.push_zeros(&["pulse_pressure", "pulse_pressure_ratio", "mean_arterial_pressure"]);
                frame.zeros()
            }
        };

        // Rate-pressure
        match (frame.raw("heart_rate"), &sys) {
            (Some(hr), Some(sys)) => {
                frame.push("rate_pressure_product", zip_with(&hr, sys, |h, s| h * s))
            }
            _ => frame.push_zeros(&["rate_pressure_product"]),
        }

        // Lipid profile
        match (
            frame.raw("cholesterol"),
            frame.raw("ldl"),
            frame.raw("hdl"),
            frame.raw("triglycerides"),
        ) {
            (Some(chol), Some(ldl), Some(hdl), Some(tg)) => {
                let ratio = |num: &Values| zip_with(num, &hdl, |n, h| n / (h + EPSILON));
                let ldl_hdl = ratio(&ldl);
                let chol_hdl = ratio(&chol);
                let tg_hdl = ratio(&tg);
                let burden = zip_with(&zip_with(&ldl_hdl, &tg_hdl, |a, b| a + b), &chol_hdl, |a, b| a + b);

                frame.push("ldl_hdl_ratio", ldl_hdl);
                frame.push("chol_hdl_ratio", chol_hdl);
                frame.push("non_hdl_cholesterol", zip_with(&chol, &hdl, |c, h| c - h));
                frame.push("ldl_share", zip_with(&ldl, &chol, |l, c| l / (c + EPSILON)));
                frame.push("tg_hdl_ratio", tg_hdl);
                frame.push("lipid_sum", zip_with(&chol, &tg, |c, t| c + t));
                frame.push("lipid_burden", burden);
            }
            _ => frame.push_zeros(&[
                "ldl_hdl_ratio",
                "chol_hdl_ratio",
                "non_hdl_cholesterol",
                "ldl_share",
                "tg_hdl_ratio",
                "lipid_sum",
                "lipid_burden",
            ]),
        }

        // Lifestyle
        let age = frame.raw("age");
        let bmi = frame.raw("bmi");
        let activity = frame.raw("physical_activity");

        match (&age, &bmi) {
            (Some(age), Some(bmi)) => frame.push("age_bmi_risk", zip_with(age, bmi, |a, b| a * b)),
            _ => frame.push_zeros(&["age_bmi_risk"]),
        }

        match (&age, &activity) {
            (Some(age), Some(act)) => {
                frame.push("activity_age_ratio", zip_with(act, age, |p, a| p / (a + EPSILON)));
                frame.push("activity_x_age", zip_with(act, age, |p, a| p * a));
            }
            _ => frame.push_zeros(&["activity_age_ratio", "activity_x_age"]),
        }

        match (frame.raw("screen_time"), &activity) {
            (Some(screen), Some(act)) => frame.push(
                "screen_activity_ratio",
                zip_with(&screen, act, |s, p| s / (p + EPSILON)),
            ),
            _ => frame.push_zeros(&["screen_activity_ratio"]),
        }

        // Composite scores: an absent term contributes 0
        let lifestyle = frame.weighted_sum(&[
            ("bmi", 0.3),
            ("waist_to_hip_ratio", 0.2),
            ("screen_time", 0.2),
            ("physical_activity", -0.2),
            ("sleep_duration", -0.1),
        ]);
        frame.push("lifestyle_risk_score", lifestyle);

        let history = frame.weighted_sum(&[("hypertension_history", 1.0), ("cardiovascular_history", 1.0)]);
        frame.push("risk_history", history);

        match (frame.raw("family_history"), &bmi) {
            (Some(fam), Some(bmi)) => {
                frame.push("genetic_history_risk", zip_with(&fam, bmi, |f, b| f * b))
            }
            _ => frame.push_zeros(&["genetic_history_risk"]),
        }

        match &age {
            Some(age) => frame.push("age_map_risk", zip_with(age, &map, |a, m| a * m)),
            None => frame.push_zeros(&["age_map_risk"]),
        }

        let out = clean_missing(frame.finish()?)?;
        debug!(rows = out.height(), columns = out.width(), "derived features");
        Ok(out)
    }
}

/// Working copy of the input plus the derived columns built so far
struct DerivationFrame<'a> {
    source: &'a DataFrame,
    derived: Vec<(&'static str, Values)>,
}

impl<'a> DerivationFrame<'a> {
    fn new(source: &'a DataFrame) -> Self {
        Self {
            source,
            derived: Vec::with_capacity(DERIVED_COLUMNS.len()),
        }
    }

    fn height(&self) -> usize {
        self.source.height()
    }

    fn zeros(&self) -> Values {
        vec![Some(0.0); self.height()]
    }

    /// Raw input column as floats, `None` when the column is absent.
    ///
    /// Cells that cannot be read as numbers become null.
    fn raw(&self, name: &str) -> Option<Values> {
        let column = self.source.column(name).ok()?;
        let cast = column.cast(&DataType::Float64).ok()?;
        let values = cast.f64().ok()?.into_iter().collect();
        Some(values)
    }

    fn push(&mut self, name: &'static str, values: Values) {
        self.derived.push((name, values));
    }

    fn push_zeros(&mut self, names: &[&'static str]) {
        for &name in names {
            let zeros = self.zeros();
            self.push(name, zeros);
        }
    }

    fn weighted_sum(&self, terms: &[(&str, f64)]) -> Values {
        let mut acc = self.zeros();
        for &(name, weight) in terms {
            if let Some(values) = self.raw(name) {
                acc = zip_with(&acc, &values, |a, v| a + weight * v);
            }
        }
        acc
    }

    fn finish(self) -> Result<DataFrame> {
        let mut out = self.source.clone();
        for (name, values) in self.derived {
            out.with_column(Series::new(name.into(), values))?;
        }
        Ok(out)
    }
}

/// Elementwise `f(a, b)`; a null on either side yields null
fn zip_with(a: &Values, b: &Values, f: impl Fn(f64, f64) -> f64) -> Values {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(f(*x, *y)),
            _ => None,
        })
        .collect()
}

/// Replace NaN, ±inf and nulls with 0.
///
/// Float columns are rewritten as Float64. Integer columns are cast to
/// Float64 only when they hold nulls. Other dtypes are left untouched.
pub fn clean_missing(df: DataFrame) -> Result<DataFrame> {
    let mut out = df;
    let names: Vec<PlSmallStr> = out.get_column_names().into_iter().cloned().collect();

    for name in names {
        let column = out.column(name.as_str())?;
        let dtype = column.dtype().clone();
        let needs_cleaning = if dtype.is_float() {
            true
        } else if dtype.is_integer() {
            column.null_count() > 0
        } else {
            false
        };
        if !needs_cleaning {
            continue;
        }

        let cast = column.cast(&DataType::Float64)?;
        let values: Vec<f64> = cast
            .f64()?
            .into_iter()
            .map(|v| match v {
                Some(v) if v.is_finite() => v,
                _ => 0.0,
            })
            .collect();
        out.with_column(Series::new(name, values))?;
    }

    Ok(out)
}
