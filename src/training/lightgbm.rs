//! LightGBM-style gradient boosting with leaf-wise tree growth
//!
//! Key differences from the XGBoost-style booster:
//! - Leaf-wise (best-first) tree growth instead of level-wise
//! - Optional Gradient-based One-Side Sampling (GOSS): keeps the rows with the
//!   largest gradients, samples the rest and reweights them
//! - Growth is bounded by leaf count; depth is unlimited unless configured

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
use std::collections::BinaryHeap;

/// GOSS sampling rates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GossConfig {
    /// Fraction of rows with the largest |gradient| that are always kept
    pub top_rate: f64,
    /// Fraction of the remaining rows sampled uniformly
    pub other_rate: f64,
}

impl Default for GossConfig {
    fn default() -> Self {
        Self { top_rate: 0.2, other_rate: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Replaces uniform row subsampling when set
    pub goss: Option<GossConfig>,
    pub random_state: Option<u64>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            goss: None,
            random_state: None,
        }
    }
}

impl LightGBMConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(PipelineError::ConfigError(
                "lightgbm needs n_estimators > 0 and learning_rate > 0".into(),
            ));
        }
        if self.max_leaves < 2 {
            return Err(PipelineError::ConfigError("lightgbm max_leaves must be >= 2".into()));
        }
        check_unit_interval("lightgbm subsample", self.subsample)?;
        check_unit_interval("lightgbm colsample_bytree", self.colsample_bytree)?;
        if let Some(goss) = &self.goss {
            check_unit_interval("lightgbm goss.top_rate", goss.top_rate)?;
            check_unit_interval("lightgbm goss.other_rate", goss.other_rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    #[cfg(test)]
    fn n_leaves(&self) -> usize {
        match self {
            LGBNode::Leaf { .. } => 1,
            LGBNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

// ---- Tree building utilities ----

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf { value: compute_leaf_weight(g, h, lambda, alpha) }
}

struct CandidateSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    config: &LightGBMConfig,
) -> Option<CandidateSplit> {
    if indices.len() < 2 {
        return None;
    }
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let base_score = compute_gain_single(total_g, total_h, config.reg_lambda);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;
    let mut best_pos = 0;

    for i in 0..sorted.len() - 1 {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];

        if i + 1 < config.min_child_samples || sorted.len() - i - 1 < config.min_child_samples {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let right_g = total_g - left_g;
        let right_h = total_h - left_h;
        let gain = compute_gain_single(left_g, left_h, config.reg_lambda)
            + compute_gain_single(right_g, right_h, config.reg_lambda)
            - base_score;

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (sorted[i].1 + sorted[i + 1].1) / 2.0;
            best_pos = i + 1;
        }
    }

    if best_gain <= 0.0 {
        return None;
    }

    Some(CandidateSplit {
        feature,
        threshold: best_threshold,
        gain: best_gain,
        left_indices: sorted[..best_pos].iter().map(|&(i, _)| i).collect(),
        right_indices: sorted[best_pos..].iter().map(|&(i, _)| i).collect(),
    })
}

fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    config: &LightGBMConfig,
) -> Option<CandidateSplit> {
    feature_indices
        .iter()
        .filter_map(|&f| find_best_split_for_feature(x, gradients, hessians, indices, f, config))
        .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(Ordering::Equal))
}

struct PendingSplit {
    node_id: usize,
    split: CandidateSplit,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split.gain.partial_cmp(&other.split.gain).unwrap_or(Ordering::Equal)
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Build one tree best-first: always expand the leaf with the largest gain
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    config: &LightGBMConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> LGBNode {
    if indices.len() < config.min_child_samples * 2 {
        return make_leaf(gradients, hessians, indices, config.reg_lambda, config.reg_alpha);
    }

    let n_features = x.ncols();
    let n_selected = ((n_features as f64 * config.colsample_bytree).ceil() as usize).clamp(1, n_features);
    let mut feature_indices: Vec<usize> = (0..n_features).collect();
    feature_indices.shuffle(rng);
    feature_indices.truncate(n_selected);
    feature_indices.sort_unstable();

    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();
    let max_depth_limit = config.max_depth.unwrap_or(usize::MAX);

    if max_depth_limit > 0 {
        if let Some(split) = best_split(x, gradients, hessians, indices, &feature_indices, config) {
            heap.push(PendingSplit { node_id: 0, split });
        }
    }

    let mut n_leaves = 1usize;

    while n_leaves < config.max_leaves {
        let Some(PendingSplit { node_id, split }) = heap.pop() else {
            break;
        };

        let depth = depths[node_id];
        let left_id = nodes.len();
        let right_id = left_id + 1;

        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;

        for (child_id, child_indices) in [(left_id, &split.left_indices), (right_id, &split.right_indices)] {
            depths.push(depth + 1);
            nodes.push(NodeSlot::Leaf(child_indices.clone()));
            if depth + 1 >= max_depth_limit || child_indices.len() < config.min_child_samples * 2 {
                continue;
            }
            if let Some(child_split) =
                best_split(x, gradients, hessians, child_indices, &feature_indices, config)
            {
                heap.push(PendingSplit { node_id: child_id, split: child_split });
            }
        }
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], lam: f64, alpha: f64) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, lam, alpha),
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, lam, alpha)),
                right: Box::new(to_node(nodes, *right, g, h, lam, alpha)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config.reg_lambda, config.reg_alpha)
}

/// GOSS: keep the top `top_rate` rows by |gradient|, sample `other_rate` of
/// the rest and amplify their gradients by (1 - a) / b.
fn goss_sample(
    gradients: &mut [f64],
    hessians: &mut [f64],
    goss: &GossConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> Vec<usize> {
    let n = gradients.len();
    let n_top = ((n as f64 * goss.top_rate).ceil() as usize).min(n);
    let n_other = (n as f64 * goss.other_rate).ceil() as usize;

    let mut sorted: Vec<usize> = (0..n).collect();
    sorted.sort_by(|&a, &b| {
        gradients[b].abs().partial_cmp(&gradients[a].abs()).unwrap_or(Ordering::Equal)
    });

    let mut selected: Vec<usize> = sorted[..n_top].to_vec();
    let mut remaining: Vec<usize> = sorted[n_top..].to_vec();
    remaining.shuffle(rng);
    remaining.truncate(n_other);

    let amplify = (1.0 - goss.top_rate) / goss.other_rate;
    for &i in &remaining {
        gradients[i] *= amplify;
        hessians[i] *= amplify;
    }
    selected.extend(remaining);
    selected.sort_unstable();
    selected
}

// ============ LightGBM Classifier ============

/// Binary classifier with logistic loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    trees: Vec<LGBNode>,
    base_prediction: f64,
    n_features: Option<usize>,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self { config, trees: Vec::new(), base_prediction: 0.0, n_features: None }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        validate_binary_training_data(x, y)?;

        let n = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        self.base_prediction = log_odds_prior(y);
        let mut raw = Array1::from_elem(n, self.base_prediction);
        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let mut gradients: Vec<f64> = probs.iter().zip(y.iter()).map(|(&p, &yi)| p - yi).collect();
            let mut hessians: Vec<f64> = probs.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let indices = match &self.config.goss {
                Some(goss) => goss_sample(&mut gradients, &mut hessians, goss, &mut rng),
                None if self.config.subsample < 1.0 => {
                    let k = (n as f64 * self.config.subsample).ceil() as usize;
                    let mut idx: Vec<usize> = (0..n).collect();
                    idx.shuffle(&mut rng);
                    idx.truncate(k);
                    idx.sort_unstable();
                    idx
                }
                None => (0..n).collect(),
            };

            let tree = build_lgb_tree(x, &gradients, &hessians, &indices, &self.config, &mut rng);
            for (i, row) in x.rows().into_iter().enumerate() {
                raw[i] += self.config.learning_rate * tree.predict(&row);
            }
            self.trees.push(tree);
        }

        self.n_features = Some(x.ncols());
        Ok(())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_raw(x)?.mapv(sigmoid))
    }

    /// Hard labels at 0.5
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    fn predict_raw(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_feature_count(self.n_features, x)?;
        let lr = self.config.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.base_prediction + self.trees.iter().map(|t| lr * t.predict(&row)).sum::<f64>())
            .collect())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl ProbabilisticClassifier for LightGBMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LightGBMClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LightGBMClassifier::predict_proba(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }
}
