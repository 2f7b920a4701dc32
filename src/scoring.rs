//! Scoring helpers for classifier selection.

use std::collections::BTreeSet;

use crate::types::Label;

/// Fraction of positions where `predicted` matches `truth`.
///
/// Empty inputs score 0.0 so a degenerate split never looks perfect.
pub fn accuracy(truth: &[Label], predicted: &[Label]) -> f64 {
    if truth.is_empty() || truth.len() != predicted.len() {
        return 0.0;
    }
    let hits = truth
        .iter()
        .zip(predicted)
        .filter(|(lhs, rhs)| lhs == rhs)
        .count();
    hits as f64 / truth.len() as f64
}

/// Rank-based area under the ROC curve over hard label predictions.
///
/// Counts concordant positive/negative pairs with half credit for score
/// ties, which reduces to the trapezoidal AUC when scores are the binary
/// predicted labels. Returns 0.0 when `truth` has fewer than two classes;
/// callers gate on [`distinct_labels`] before relying on this value.
pub fn auc(truth: &[Label], predicted: &[Label]) -> f64 {
    if truth.len() != predicted.len() {
        return 0.0;
    }
    let positive = match truth.iter().max() {
        Some(max) if distinct_labels(truth) >= 2 => *max,
        _ => return 0.0,
    };
    let mut concordant = 0.0_f64;
    let mut pairs = 0.0_f64;
    for (truth_a, score_a) in truth.iter().zip(predicted) {
        if *truth_a != positive {
            continue;
        }
        for (truth_b, score_b) in truth.iter().zip(predicted) {
            if *truth_b == positive {
                continue;
            }
            pairs += 1.0;
            if score_a > score_b {
                concordant += 1.0;
            } else if score_a == score_b {
                concordant += 0.5;
            }
        }
    }
    if pairs == 0.0 { 0.0 } else { concordant / pairs }
}

/// Number of distinct values in `labels`.
///
/// Drives the AUC-versus-accuracy fallback: a single-class held-out split
/// makes AUC undefined.
pub fn distinct_labels(labels: &[Label]) -> usize {
    labels.iter().copied().collect::<BTreeSet<Label>>().len()
}
