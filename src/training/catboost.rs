//! CatBoost-style gradient boosting on symmetric trees
//!
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Candidate thresholds are quantized once per fit into at most `border_count` borders
//! - Rows are binned against those borders once per fit, and every level scores its
//!   splits from per-bucket gradient histograms
//! - Newton leaf values with L2 regularization, `-G / (H + lambda)`

use super::classifier::{
    check_feature_count, check_unit_interval, log_odds_prior, sigmoid,
    validate_binary_training_data, ProbabilisticClassifier,
};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of every symmetric tree
    pub max_depth: usize,
    pub reg_lambda: f64,
    /// Maximum number of split borders per feature
    pub border_count: usize,
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            reg_lambda: 3.0,
            border_count: 254,
            subsample: 1.0,
            random_state: None,
        }
    }
}

impl CatBoostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(PipelineError::ConfigError(
                "catboost needs n_estimators > 0 and learning_rate > 0".into(),
            ));
        }
        if self.max_depth == 0 || self.max_depth > 16 {
            return Err(PipelineError::ConfigError(format!(
                "catboost max_depth must be in 1..=16, got {}",
                self.max_depth
            )));
        }
        if self.border_count == 0 {
            return Err(PipelineError::ConfigError("catboost border_count must be positive".into()));
        }
        if self.reg_lambda < 0.0 {
            return Err(PipelineError::ConfigError("catboost reg_lambda must be non-negative".into()));
        }
        check_unit_interval("catboost subsample", self.subsample)
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>, // (feature, threshold) per level
    leaf_values: Vec<f64>,     // 2^depth leaf values
}

impl SymmetricTree {
    fn leaf_index(&self, sample: &ArrayView1<f64>) -> usize {
        self.splits.iter().fold(0usize, |idx, &(feature, threshold)| {
            idx * 2 + usize::from(sample[feature] > threshold)
        })
    }

    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        self.leaf_values
            .get(self.leaf_index(sample))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Quantized split borders for one feature
fn feature_borders(column: ArrayView1<f64>, border_count: usize) -> Vec<f64> {
    let mut values: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    values.dedup();

    if values.len() < 2 {
        return Vec::new();
    }
    let midpoints: Vec<f64> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    if midpoints.len() <= border_count {
        return midpoints;
    }

    // Evenly spaced quantiles of the midpoints
    let mut borders: Vec<f64> = (0..border_count)
        .map(|k| {
            let pos = ((k as f64 + 0.5) / border_count as f64 * midpoints.len() as f64) as usize;
            midpoints[pos.min(midpoints.len() - 1)]
        })
        .collect();
    borders.dedup();
    borders
}

/// Bin index of every value: the number of borders strictly below it.
///
/// `x <= borders[t]` holds exactly when the bin is at most `t`, so a split on
/// border `t` sends bins `0..=t` left.
fn bin_features(x: &Array2<f64>, borders: &[Vec<f64>]) -> Array2<u32> {
    Array2::from_shape_fn(x.dim(), |(row, feat)| {
        let value = x[[row, feat]];
        borders[feat].partition_point(|&b| b < value) as u32
    })
}

/// Split score of one bucket, summed over both children minus the parent
fn split_gain(lg: f64, lh: f64, rg: f64, rh: f64, reg_lambda: f64) -> f64 {
    let parent_g = lg + rg;
    let parent_h = lh + rh;
    lg * lg / (lh + reg_lambda) + rg * rg / (rh + reg_lambda)
        - parent_g * parent_g / (parent_h + reg_lambda)
}

/// Best `(feature, border index, gain)` shared by every bucket of one level
///
/// Each bucket is binned once per feature into a gradient/hessian histogram;
/// prefix sums over the bins then give the left side of every border.
fn best_level_split(
    bins: &Array2<u32>,
    gradients: &[f64],
    hessians: &[f64],
    buckets: &[Vec<usize>],
    borders: &[Vec<f64>],
    reg_lambda: f64,
) -> Option<(usize, usize, f64)> {
    borders
        .iter()
        .enumerate()
        .filter(|(_, feat_borders)| !feat_borders.is_empty())
        .filter_map(|(feat, feat_borders)| {
            let n_bins = feat_borders.len() + 1;
            let mut total_gain = vec![0.0; feat_borders.len()];
            let mut hist_g = vec![0.0; n_bins];
            let mut hist_h = vec![0.0; n_bins];

            for bucket in buckets {
                hist_g.iter_mut().for_each(|v| *v = 0.0);
                hist_h.iter_mut().for_each(|v| *v = 0.0);
                for &idx in bucket {
                    let bin = bins[[idx, feat]] as usize;
                    hist_g[bin] += gradients[idx];
                    hist_h[bin] += hessians[idx];
                }
                let sum_g: f64 = hist_g.iter().sum();
                let sum_h: f64 = hist_h.iter().sum();

                let (mut lg, mut lh) = (0.0, 0.0);
                for (t, gain) in total_gain.iter_mut().enumerate() {
                    lg += hist_g[t];
                    lh += hist_h[t];
                    *gain += split_gain(lg, lh, sum_g - lg, sum_h - lh, reg_lambda);
                }
            }

            let mut best: Option<(usize, f64)> = None;
            for (t, &gain) in total_gain.iter().enumerate() {
                if best.map_or(true, |(_, g)| gain > g) {
                    best = Some((t, gain));
                }
            }
            best.filter(|&(_, gain)| gain > 0.0)
                .map(|(t, gain)| (feat, t, gain))
        })
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
}

fn build_symmetric_tree(
    bins: &Array2<u32>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    borders: &[Vec<f64>],
    max_depth: usize,
    reg_lambda: f64,
) -> SymmetricTree {
    let mut splits = Vec::with_capacity(max_depth);

    // Current partition of indices into buckets
    let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

    for _depth in 0..max_depth {
        // Symmetric: one split shared by every bucket at this level
        match best_level_split(bins, gradients, hessians, &buckets, borders, reg_lambda) {
            Some((feat, t, _)) => {
                splits.push((feat, borders[feat][t]));
                let border = t as u32;
                let mut new_buckets = Vec::with_capacity(buckets.len() * 2);
                for bucket in &buckets {
                    let (left, right): (Vec<usize>, Vec<usize>) =
                        bucket.iter().partition(|&&i| bins[[i, feat]] <= border);
                    new_buckets.push(left);
                    new_buckets.push(right);
                }
                buckets = new_buckets;
            }
            None => break,
        }
    }

    let leaf_values: Vec<f64> = buckets
        .iter()
        .map(|bucket| {
            if bucket.is_empty() {
                return 0.0;
            }
            let g: f64 = bucket.iter().map(|&i| gradients[i]).sum();
            let h: f64 = bucket.iter().map(|&i| hessians[i]).sum();
            -g / (h + reg_lambda)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

// ============ CatBoost Classifier ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostClassifier {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: Option<usize>,
}

impl CatBoostClassifier {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        validate_binary_training_data(x, y)?;

        let n = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        self.base_prediction = log_odds_prior(y);
        let mut raw = Array1::from_elem(n, self.base_prediction);

        let borders: Vec<Vec<f64>> = x
            .columns()
            .into_iter()
            .map(|col| feature_borders(col, self.config.border_count))
            .collect();
        let bins = bin_features(x, &borders);

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let gradients: Vec<f64> = probs.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let hessians: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = ((n as f64 * self.config.subsample).ceil() as usize).max(1);
                let mut sub: Vec<usize> = (0..n).collect();
                sub.shuffle(&mut rng);
                sub.truncate(k);
                sub
            } else {
                (0..n).collect()
            };

            let tree = build_symmetric_tree(
                &bins,
                &gradients,
                &hessians,
                &indices,
                &borders,
                self.config.max_depth,
                self.config.reg_lambda,
            );

            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += self.config.learning_rate * tree.predict(&row);
            }
            self.trees.push(tree);
        }

        self.n_features = Some(x.ncols());
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let raw = self.predict_raw(x)?;
        Ok(raw.mapv(|r| if sigmoid(r) >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_raw(x)?.mapv(sigmoid))
    }

    fn predict_raw(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_feature_count(self.n_features, x)?;
        let lr = self.config.learning_rate;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.base_prediction + self.trees.iter().map(|t| lr * t.predict(&row)).sum::<f64>()
            })
            .collect())
    }
}

impl ProbabilisticClassifier for CatBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        CatBoostClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        CatBoostClassifier::predict_proba(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }
}
