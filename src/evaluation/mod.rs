//! Scoring of probability predictions against binary labels

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Default decision threshold for the thresholded metrics
pub const DEFAULT_THRESHOLD: f64 = 0.55;

fn check_inputs(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<(usize, usize)> {
    if y_true.len() != scores.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }
    let positives = y_true.iter().filter(|&&v| v > 0.5).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::ValidationError(
            "ROC/PR scores need both classes in y_true".to_string(),
        ));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(PipelineError::ValidationError("scores contain non-finite values".to_string()));
    }
    Ok((positives, negatives))
}

/// Indices of `scores` in descending order
fn descending_order(scores: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order
}

/// Area under the ROC curve.
///
/// Mann-Whitney formulation: tied scores share their average rank, so a
/// constant predictor scores exactly 0.5.
pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let (positives, negatives) = check_inputs(y_true, scores)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the tie block [start, end) shares the mean rank
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let tied_pos = order[start..end].iter().filter(|&&i| y_true[i] > 0.5).count();
        rank_sum_pos += avg_rank * tied_pos as f64;
        start = end;
    }

    let n_pos = positives as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * negatives as f64))
}

/// Average precision: Σ (R_n − R_{n−1}) · P_n over distinct thresholds
pub fn average_precision_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let (positives, _) = check_inputs(y_true, scores)?;
    let order = descending_order(scores);

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if y_true[order[i]] > 0.5 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let precision = tp as f64 / (tp + fp) as f64;
        let recall = tp as f64 / positives as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Ok(ap)
}

/// Metrics for one set of probability predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub threshold: f64,
}

impl EvaluationReport {
    /// Score `probas` against `y_true`, thresholding at `probas >= threshold`
    pub fn evaluate(y_true: &Array1<f64>, probas: &Array1<f64>, threshold: f64) -> Result<Self> {
        let roc_auc = roc_auc_score(y_true, probas)?;
        let pr_auc = average_precision_score(y_true, probas)?;

        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (&t, &p) in y_true.iter().zip(probas.iter()) {
            match (t > 0.5, p >= threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }

        let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self { roc_auc, pr_auc, precision, recall, f1, threshold })
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roc_auc={:.5} pr_auc={:.5} precision={:.5} recall={:.5} f1={:.5} threshold={:.2}",
            self.roc_auc, self.pr_auc, self.precision, self.recall, self.f1, self.threshold
        )
    }
}
