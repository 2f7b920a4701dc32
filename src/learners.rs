//! Supervised learning collaborators: the two classifier families the
//! tuner searches over.
//!
//! Family A is a bagged ensemble of depth-limited decision trees; family B
//! is an additive gradient-boosted ensemble of shallow regression trees.
//! Both are used only through `fit(params, features, labels)` and
//! `predict(features)`, and both artifacts serialize for the registry.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::features::FeatureMatrix;
use crate::types::Label;

/// Impurity measure used when growing classification trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity.
    Gini,
    /// Shannon entropy.
    Entropy,
}

/// Per-split feature subsampling strategy for the forest family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Consider `sqrt(feature_count)` features per split.
    Sqrt,
    /// Consider `log2(feature_count)` features per split.
    Log2,
}

impl MaxFeatures {
    fn sample_width(self, feature_count: usize) -> usize {
        let width = match self {
            Self::Sqrt => (feature_count as f64).sqrt().round() as usize,
            Self::Log2 => (feature_count as f64).log2().ceil() as usize,
        };
        width.clamp(1, feature_count)
    }
}

/// Parameters for the tree-ensemble family.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of bagged trees.
    pub estimators: usize,
    /// Impurity measure for split selection.
    pub criterion: SplitCriterion,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Per-split feature subsampling strategy.
    pub max_features: MaxFeatures,
}

/// Parameters for the gradient-boosted family.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoostedParams {
    /// Shrinkage applied to each boosting stage.
    pub learning_rate: f64,
    /// Maximum depth of each stage's regression tree.
    pub max_depth: usize,
    /// Number of boosting stages.
    pub estimators: usize,
}

/// A depth-limited binary tree over feature thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn evaluate(&self, row: &[f64]) -> f64 {
        match self {
            Self::Leaf { value } => *value,
            Self::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.evaluate(row)
                } else {
                    right.evaluate(row)
                }
            }
        }
    }
}

/// Trained tree-ensemble classifier (family A).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForestClassifier {
    trees: Vec<TreeNode>,
    classes: Vec<Label>,
}

/// Trained gradient-boosted classifier (family B).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoostedClassifier {
    base_score: f64,
    learning_rate: f64,
    stages: Vec<TreeNode>,
    classes: Vec<Label>,
}

/// Envelope over either trained family, so the registry can persist and
/// reload a classifier without knowing which family won tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ClassifierModel {
    /// Tree-ensemble artifact.
    Forest(ForestClassifier),
    /// Gradient-boosted artifact.
    Boosted(BoostedClassifier),
}

impl ClassifierModel {
    /// Predict one label per feature row.
    pub fn predict(&self, features: &FeatureMatrix) -> Vec<Label> {
        match self {
            Self::Forest(model) => model.predict(features),
            Self::Boosted(model) => model.predict(features),
        }
    }
}

fn check_training_input(
    features: &FeatureMatrix,
    labels: &[Label],
) -> Result<Vec<Label>, PipelineError> {
    if features.is_empty() {
        return Err(PipelineError::Tuning(
            "cannot train a classifier on zero rows".to_string(),
        ));
    }
    if features.len() != labels.len() {
        return Err(PipelineError::Tuning(format!(
            "feature matrix has {} rows but {} labels were supplied",
            features.len(),
            labels.len()
        )));
    }
    let mut classes: Vec<Label> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    Ok(classes)
}

impl ForestClassifier {
    /// Train a bagged forest with `params`, deterministic for `seed`.
    pub fn fit(
        params: &ForestParams,
        features: &FeatureMatrix,
        labels: &[Label],
        seed: u64,
    ) -> Result<Self, PipelineError> {
        let classes = check_training_input(features, labels)?;
        if params.estimators == 0 {
            return Err(PipelineError::Tuning(
                "forest needs at least one estimator".to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.estimators);
        for _ in 0..params.estimators {
            let sample: Vec<usize> = (0..features.len())
                .map(|_| rng.random_range(0..features.len()))
                .collect();
            trees.push(grow_classification_tree(
                features,
                labels,
                &sample,
                params,
                0,
                &mut rng,
            ));
        }
        Ok(Self { trees, classes })
    }

    /// Majority vote across the bagged trees.
    pub fn predict(&self, features: &FeatureMatrix) -> Vec<Label> {
        features
            .rows
            .iter()
            .map(|row| {
                let mut votes = vec![0_usize; self.classes.len()];
                for tree in &self.trees {
                    let class_idx = tree.evaluate(row) as usize;
                    if let Some(count) = votes.get_mut(class_idx) {
                        *count += 1;
                    }
                }
                let winner = votes
                    .iter()
                    .enumerate()
                    .max_by_key(|(idx, count)| (**count, std::cmp::Reverse(*idx)))
                    .map(|(idx, _)| idx)
                    .unwrap_or(0);
                self.classes[winner]
            })
            .collect()
    }
}

impl BoostedClassifier {
    /// Train an additive boosted ensemble with `params`.
    ///
    /// Stages fit squared-loss residuals of the class-value target;
    /// prediction snaps the accumulated score to the nearest trained class.
    /// Training touches no RNG, so it is deterministic by construction.
    pub fn fit(
        params: &BoostedParams,
        features: &FeatureMatrix,
        labels: &[Label],
    ) -> Result<Self, PipelineError> {
        let classes = check_training_input(features, labels)?;
        if params.estimators == 0 {
            return Err(PipelineError::Tuning(
                "boosting needs at least one estimator".to_string(),
            ));
        }
        let targets: Vec<f64> = labels.iter().map(|label| *label as f64).collect();
        let base_score = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![base_score; targets.len()];
        let mut stages = Vec::with_capacity(params.estimators);
        let all_rows: Vec<usize> = (0..features.len()).collect();
        for _ in 0..params.estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&predictions)
                .map(|(target, prediction)| target - prediction)
                .collect();
            let stage =
                grow_regression_tree(features, &residuals, &all_rows, params.max_depth, 0);
            for (prediction, row) in predictions.iter_mut().zip(&features.rows) {
                *prediction += params.learning_rate * stage.evaluate(row);
            }
            stages.push(stage);
        }
        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            stages,
            classes,
        })
    }

    /// Accumulate the staged scores and snap to the nearest class value.
    pub fn predict(&self, features: &FeatureMatrix) -> Vec<Label> {
        features
            .rows
            .iter()
            .map(|row| {
                let mut score = self.base_score;
                for stage in &self.stages {
                    score += self.learning_rate * stage.evaluate(row);
                }
                nearest_class(&self.classes, score)
            })
            .collect()
    }
}

fn nearest_class(classes: &[Label], score: f64) -> Label {
    let mut best = classes[0];
    let mut best_distance = f64::INFINITY;
    for class in classes {
        let distance = (*class as f64 - score).abs();
        if distance < best_distance {
            best = *class;
            best_distance = distance;
        }
    }
    best
}

/// Midpoints between consecutive sorted unique values of one feature.
fn candidate_thresholds(values: &mut Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values.dedup();
    values
        .windows(2)
        .map(|pair| (pair[0] + pair[1]) / 2.0)
        .collect()
}

fn impurity(counts: &[usize], total: usize, criterion: SplitCriterion) -> f64 {
    if total == 0 {
        return 0.0;
    }
    match criterion {
        SplitCriterion::Gini => {
            1.0 - counts
                .iter()
                .map(|count| {
                    let p = *count as f64 / total as f64;
                    p * p
                })
                .sum::<f64>()
        }
        SplitCriterion::Entropy => counts
            .iter()
            .filter(|count| **count > 0)
            .map(|count| {
                let p = *count as f64 / total as f64;
                -p * p.log2()
            })
            .sum(),
    }
}

fn grow_classification_tree(
    features: &FeatureMatrix,
    labels: &[Label],
    rows: &[usize],
    params: &ForestParams,
    depth: usize,
    rng: &mut StdRng,
) -> TreeNode {
    let class_index = class_index_map(labels);
    let counts = count_classes(labels, rows, &class_index);
    let majority = majority_class(&counts);

    if depth >= params.max_depth || rows.len() < 2 || counts.iter().filter(|c| **c > 0).count() < 2
    {
        return TreeNode::Leaf {
            value: majority as f64,
        };
    }

    let width = params.max_features.sample_width(features.feature_count());
    let mut candidates: Vec<usize> = (0..features.feature_count()).collect();
    // Fisher-Yates prefix: pick `width` distinct features.
    for idx in 0..width {
        let swap = rng.random_range(idx..candidates.len());
        candidates.swap(idx, swap);
    }
    candidates.truncate(width);

    let parent_impurity = impurity(&counts, rows.len(), params.criterion);
    let mut best: Option<(f64, usize, f64)> = None;
    for &feature in &candidates {
        let mut values: Vec<f64> = rows.iter().map(|&row| features.rows[row][feature]).collect();
        for threshold in candidate_thresholds(&mut values) {
            let (left_counts, right_counts, left_total, right_total) =
                split_counts(features, labels, rows, feature, threshold, &class_index);
            if left_total == 0 || right_total == 0 {
                continue;
            }
            let weighted = (left_total as f64 * impurity(&left_counts, left_total, params.criterion)
                + right_total as f64 * impurity(&right_counts, right_total, params.criterion))
                / rows.len() as f64;
            let gain = parent_impurity - weighted;
            if best.as_ref().is_none_or(|(best_gain, _, _)| gain > *best_gain) {
                best = Some((gain, feature, threshold));
            }
        }
    }

    let Some((gain, feature, threshold)) = best else {
        return TreeNode::Leaf {
            value: majority as f64,
        };
    };
    if gain <= 0.0 {
        return TreeNode::Leaf {
            value: majority as f64,
        };
    }

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&row| features.rows[row][feature] <= threshold);
    let left = grow_classification_tree(features, labels, &left_rows, params, depth + 1, rng);
    let right = grow_classification_tree(features, labels, &right_rows, params, depth + 1, rng);
    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn class_index_map(labels: &[Label]) -> Vec<Label> {
    let mut classes: Vec<Label> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

fn count_classes(labels: &[Label], rows: &[usize], classes: &[Label]) -> Vec<usize> {
    let mut counts = vec![0_usize; classes.len()];
    for &row in rows {
        if let Ok(idx) = classes.binary_search(&labels[row]) {
            counts[idx] += 1;
        }
    }
    counts
}

fn majority_class(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .max_by_key(|(idx, count)| (**count, std::cmp::Reverse(*idx)))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

#[allow(clippy::type_complexity)]
fn split_counts(
    features: &FeatureMatrix,
    labels: &[Label],
    rows: &[usize],
    feature: usize,
    threshold: f64,
    classes: &[Label],
) -> (Vec<usize>, Vec<usize>, usize, usize) {
    let mut left = vec![0_usize; classes.len()];
    let mut right = vec![0_usize; classes.len()];
    let mut left_total = 0;
    let mut right_total = 0;
    for &row in rows {
        let idx = classes.binary_search(&labels[row]).unwrap_or(0);
        if features.rows[row][feature] <= threshold {
            left[idx] += 1;
            left_total += 1;
        } else {
            right[idx] += 1;
            right_total += 1;
        }
    }
    (left, right, left_total, right_total)
}

fn grow_regression_tree(
    features: &FeatureMatrix,
    targets: &[f64],
    rows: &[usize],
    max_depth: usize,
    depth: usize,
) -> TreeNode {
    let mean = rows.iter().map(|&row| targets[row]).sum::<f64>() / rows.len().max(1) as f64;
    if depth >= max_depth || rows.len() < 2 {
        return TreeNode::Leaf { value: mean };
    }

    let parent_sse = sse(targets, rows, mean);
    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..features.feature_count() {
        let mut values: Vec<f64> = rows.iter().map(|&row| features.rows[row][feature]).collect();
        for threshold in candidate_thresholds(&mut values) {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .copied()
                .partition(|&row| features.rows[row][feature] <= threshold);
            if left_rows.is_empty() || right_rows.is_empty() {
                continue;
            }
            let left_mean =
                left_rows.iter().map(|&row| targets[row]).sum::<f64>() / left_rows.len() as f64;
            let right_mean =
                right_rows.iter().map(|&row| targets[row]).sum::<f64>() / right_rows.len() as f64;
            let split_sse = sse(targets, &left_rows, left_mean) + sse(targets, &right_rows, right_mean);
            let gain = parent_sse - split_sse;
            if best.as_ref().is_none_or(|(best_gain, _, _)| gain > *best_gain) {
                best = Some((gain, feature, threshold));
            }
        }
    }

    let Some((gain, feature, threshold)) = best else {
        return TreeNode::Leaf { value: mean };
    };
    if gain <= 1e-12 {
        return TreeNode::Leaf { value: mean };
    }

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&row| features.rows[row][feature] <= threshold);
    TreeNode::Split {
        feature,
        threshold,
        left: Box::new(grow_regression_tree(
            features, targets, &left_rows, max_depth, depth + 1,
        )),
        right: Box::new(grow_regression_tree(
            features, targets, &right_rows, max_depth, depth + 1,
        )),
    }
}

fn sse(targets: &[f64], rows: &[usize], mean: f64) -> f64 {
    rows.iter()
        .map(|&row| {
            let diff = targets[row] - mean;
            diff * diff
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (FeatureMatrix, Vec<Label>) {
        let rows = vec![
            vec![0.0, 1.0],
            vec![0.5, 1.2],
            vec![0.2, 0.8],
            vec![0.4, 1.1],
            vec![5.0, 4.8],
            vec![5.5, 5.2],
            vec![5.2, 5.1],
            vec![4.9, 4.7],
        ];
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let features = FeatureMatrix::new(
            (0..rows.len()).map(|idx| format!("e{idx}")).collect(),
            vec!["x".into(), "y".into()],
            rows,
        )
        .unwrap();
        (features, labels)
    }

    fn forest_params() -> ForestParams {
        ForestParams {
            estimators: 15,
            criterion: SplitCriterion::Gini,
            max_depth: 3,
            max_features: MaxFeatures::Sqrt,
        }
    }

    #[test]
    fn forest_learns_a_separable_problem() {
        let (features, labels) = separable();
        let model = ForestClassifier::fit(&forest_params(), &features, &labels, 7).unwrap();
        assert_eq!(model.predict(&features), labels);
    }

    #[test]
    fn forest_training_is_deterministic_for_a_seed() {
        let (features, labels) = separable();
        let first = ForestClassifier::fit(&forest_params(), &features, &labels, 3).unwrap();
        let second = ForestClassifier::fit(&forest_params(), &features, &labels, 3).unwrap();
        assert_eq!(first.predict(&features), second.predict(&features));
    }

    #[test]
    fn entropy_criterion_also_separates() {
        let (features, labels) = separable();
        let params = ForestParams {
            criterion: SplitCriterion::Entropy,
            max_features: MaxFeatures::Log2,
            ..forest_params()
        };
        let model = ForestClassifier::fit(&params, &features, &labels, 11).unwrap();
        assert_eq!(model.predict(&features), labels);
    }

    #[test]
    fn boosted_learns_a_separable_problem() {
        let (features, labels) = separable();
        let params = BoostedParams {
            learning_rate: 0.5,
            max_depth: 2,
            estimators: 20,
        };
        let model = BoostedClassifier::fit(&params, &features, &labels).unwrap();
        assert_eq!(model.predict(&features), labels);
    }

    #[test]
    fn label_count_mismatch_is_a_tuning_error() {
        let (features, _) = separable();
        let err = ForestClassifier::fit(&forest_params(), &features, &[0, 1], 1).unwrap_err();
        assert!(matches!(err, PipelineError::Tuning(_)));
    }

    #[test]
    fn empty_matrix_is_a_tuning_error() {
        let features =
            FeatureMatrix::new(Vec::new(), vec!["x".into()], Vec::new()).unwrap();
        let err = BoostedClassifier::fit(
            &BoostedParams {
                learning_rate: 0.1,
                max_depth: 2,
                estimators: 5,
            },
            &features,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Tuning(_)));
    }

    #[test]
    fn classifier_model_round_trips_through_serde() {
        let (features, labels) = separable();
        let model = ClassifierModel::Forest(
            ForestClassifier::fit(&forest_params(), &features, &labels, 5).unwrap(),
        );
        let encoded = serde_json::to_string(&model).unwrap();
        let decoded: ClassifierModel = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.predict(&features), model.predict(&features));
    }
}
