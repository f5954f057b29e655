//! XGBoost-style gradient boosting with second-order approximation
//!
//! - Uses both gradient (first derivative) and hessian (second derivative) of the logistic loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Built-in L1 (alpha) and L2 (lambda) regularization
//! - Minimum child weight constraint
//! - Level-wise growth bounded by `max_depth`, exact greedy split finding

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

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: None,
        }
    }
}

impl XGBoostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(PipelineError::ConfigError(
                "xgboost needs n_estimators > 0 and learning_rate > 0".into(),
            ));
        }
        if self.reg_lambda < 0.0 || self.reg_alpha < 0.0 || self.gamma < 0.0 {
            return Err(PipelineError::ConfigError(
                "xgboost regularization terms must be non-negative".into(),
            ));
        }
        check_unit_interval("xgboost subsample", self.subsample)?;
        check_unit_interval("xgboost colsample_bytree", self.colsample_bytree)
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        match self {
            XGBNode::Leaf { .. } => 0,
            XGBNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

struct GradientPair<'a> {
    grad: &'a [f64],
    hess: &'a [f64],
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    gh: &GradientPair<'_>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| gh.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| gh.hess[i]).sum();
    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    let best_split = feature_indices
        .iter()
        .filter_map(|&f| find_best_split_for_feature(x, gh, indices, f, config))
        .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, gh, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, gh, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g_sum > alpha {
        g_sum - alpha
    } else if g_sum < -alpha {
        g_sum + alpha
    } else {
        return 0.0;
    };
    -g_adj / (h_sum + lambda)
}

/// Best (feature, threshold, gain) for one feature, exact greedy
fn find_best_split_for_feature(
    x: &Array2<f64>,
    gh: &GradientPair<'_>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| gh.grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| gh.hess[i]).sum();
    let lambda = config.reg_lambda;
    let parent_score = (g_total * g_total) / (h_total + lambda);

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(f64, f64)> = None;

    // The last position would leave the right child empty
    for pos in 0..sorted_indices.len().saturating_sub(1) {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += gh.grad[idx];
        h_left += gh.hess[idx];

        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda)
                - parent_score);

        if best.map_or(true, |(_, g)| gain > g) {
            let threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
            best = Some((threshold, gain));
        }
    }

    best.map(|(threshold, gain)| (feature, threshold, gain))
}

// ─── XGBoost Classifier ────────────────────────────────────────────────────

/// XGBoost Classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: Option<usize>,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: None,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        validate_binary_training_data(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        // Base score in log-odds space
        self.base_score = log_odds_prior(y);
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(sigmoid);
            let grad: Vec<f64> = probs.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let hess: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-7)).collect();
            let gh = GradientPair { grad: &grad, hess: &hess };

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &gh, &row_indices, &col_indices, 0, &self.config);

            // Every row moves, sampled or not, so raw scores match what predict_proba will see
            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += self.config.learning_rate * tree.predict(&row);
            }

            self.trees.push(tree);
        }

        self.n_features = Some(n_features);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_feature_count(self.n_features, x)?;
        let lr = self.config.learning_rate;
        let raw: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| self.base_score + self.trees.iter().map(|t| lr * t.predict(&row)).sum::<f64>())
            .collect();
        Ok(raw.mapv(sigmoid))
    }

    /// Compute feature importances by counting splits across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        let n_features = self.n_features?;
        let mut counts = vec![0.0f64; n_features];
        for tree in &self.trees {
            xgb_count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

impl ProbabilisticClassifier for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        XGBoostClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        XGBoostClassifier::predict_proba(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }
}

fn xgb_count_splits(node: &XGBNode, counts: &mut [f64]) {
    if let XGBNode::Split { feature, left, right, .. } = node {
        if *feature < counts.len() {
            counts[*feature] += 1.0;
        }
        xgb_count_splits(left, counts);
        xgb_count_splits(right, counts);
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2),
            (0..100).map(|i| i as f64 * 0.1).collect()
        ).unwrap();
        let y: Array1<f64> = x.rows().into_iter()
            .map(|r| if r[0] + r[1] > 5.0 { 1.0 } else { 0.0 })
            .collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_classifier() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| (*p - *a).abs() < 0.5).count();
        let acc = correct as f64 / y.len() as f64;
        assert!(acc >= 0.9, "XGBoost classifier accuracy = {}", acc);
    }

    #[test]
    fn test_xgboost_predict_proba() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(Default::default());
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), x.nrows());
        assert!(proba.iter().all(|&p| p >= 0.0 && p <= 1.0));
    }

    #[test]
    fn test_xgboost_depth_limit() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 5,
            max_depth: 2,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        assert!(model.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_xgboost_regularization() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 30,
            reg_lambda: 10.0,
            reg_alpha: 1.0,
            gamma: 1.0,
            subsample: 0.8,
            colsample_bytree: 0.5,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 50);
    }

    #[test]
    fn test_xgboost_feature_importances() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig { n_estimators: 10, ..Default::default() });
        assert!(model.feature_importances().is_none());
        model.fit(&x, &y).unwrap();
        let importances = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_xgboost_invalid_config() {
        let (x, y) = classification_data();
        let mut model = XGBoostClassifier::new(XGBoostConfig { subsample: 0.0, ..Default::default() });
        assert!(matches!(model.fit(&x, &y), Err(PipelineError::ConfigError(_))));
    }
}
