//! Hyperparameter search and best-model selection per group.

use std::fmt;

use tracing::{debug, info};

use crate::constants::tuning::{
    BOOSTED_ESTIMATORS, BOOSTED_LEARNING_RATES, BOOSTED_MAX_DEPTHS, DEFAULT_FOLDS,
    FOREST_ESTIMATORS, FOREST_MAX_DEPTHS,
};
use crate::errors::PipelineError;
use crate::features::FeatureMatrix;
use crate::learners::{
    BoostedClassifier, BoostedParams, ClassifierModel, ForestClassifier, ForestParams,
    MaxFeatures, SplitCriterion,
};
use crate::scoring::{accuracy, auc, distinct_labels};
use crate::search::grid_search;
use crate::types::Label;

/// Classifier family identifier, used in logs and tuning results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FamilyName {
    /// Tree-ensemble family (family A).
    Forest,
    /// Gradient-boosted family (family B).
    Boosted,
}

impl fmt::Display for FamilyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forest => write!(f, "forest"),
            Self::Boosted => write!(f, "boosted"),
        }
    }
}

/// Outcome of selecting the best classifier for one group.
///
/// Ephemeral: only the winning `model` is persisted by the caller.
#[derive(Clone, Debug)]
pub struct TuningResult {
    /// Family that won selection.
    pub family: FamilyName,
    /// The trained winning classifier.
    pub model: ClassifierModel,
    /// Held-out score of the winner.
    pub score: f64,
}

/// Immutable tuner configuration: fixed parameter grids, fold count, seed.
///
/// Constructed once and passed in; nothing here is mutated by a tuning run.
#[derive(Clone, Debug)]
pub struct TunerConfig {
    /// Grid searched for the tree-ensemble family.
    pub forest_grid: Vec<ForestParams>,
    /// Grid searched for the gradient-boosted family.
    pub boosted_grid: Vec<BoostedParams>,
    /// Cross-validation fold count.
    pub folds: usize,
    /// Seed for forest bagging during search and refit.
    pub seed: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        let mut forest_grid = Vec::new();
        for &estimators in &FOREST_ESTIMATORS {
            for criterion in [SplitCriterion::Gini, SplitCriterion::Entropy] {
                for &max_depth in &FOREST_MAX_DEPTHS {
                    for max_features in [MaxFeatures::Sqrt, MaxFeatures::Log2] {
                        forest_grid.push(ForestParams {
                            estimators,
                            criterion,
                            max_depth,
                            max_features,
                        });
                    }
                }
            }
        }
        let mut boosted_grid = Vec::new();
        for &learning_rate in &BOOSTED_LEARNING_RATES {
            for &max_depth in &BOOSTED_MAX_DEPTHS {
                for &estimators in &BOOSTED_ESTIMATORS {
                    boosted_grid.push(BoostedParams {
                        learning_rate,
                        max_depth,
                        estimators,
                    });
                }
            }
        }
        Self {
            forest_grid,
            boosted_grid,
            folds: DEFAULT_FOLDS,
            seed: 42,
        }
    }
}

/// Runs grid search per family and picks the better trained classifier.
pub struct ModelTuner {
    config: TunerConfig,
}

impl ModelTuner {
    /// Create a tuner with an explicit, already-built configuration.
    pub fn new(config: TunerConfig) -> Self {
        Self { config }
    }

    /// Grid-search family A over its fixed space with k-fold cross-validation,
    /// then refit the best parameters on the full supplied data.
    pub fn search_forest_params(
        &self,
        features: &FeatureMatrix,
        labels: &[Label],
    ) -> Result<ForestClassifier, PipelineError> {
        let best = grid_search(
            &self.config.forest_grid,
            features.len(),
            self.config.folds,
            |params, train, test| {
                let model =
                    ForestClassifier::fit(params, &features.select(train), &index_labels(labels, train), self.config.seed)?;
                let predicted = model.predict(&features.select(test));
                Ok(accuracy(&index_labels(labels, test), &predicted))
            },
        )
        .map_err(|err| PipelineError::Tuning(format!("forest search failed: {err}")))?;
        debug!(?best, "refitting best forest parameters");
        ForestClassifier::fit(&best, features, labels, self.config.seed)
            .map_err(|err| PipelineError::Tuning(format!("forest refit failed: {err}")))
    }

    /// Grid-search family B over its fixed space, refit best on full data.
    pub fn search_boosted_params(
        &self,
        features: &FeatureMatrix,
        labels: &[Label],
    ) -> Result<BoostedClassifier, PipelineError> {
        let best = grid_search(
            &self.config.boosted_grid,
            features.len(),
            self.config.folds,
            |params, train, test| {
                let model =
                    BoostedClassifier::fit(params, &features.select(train), &index_labels(labels, train))?;
                let predicted = model.predict(&features.select(test));
                Ok(accuracy(&index_labels(labels, test), &predicted))
            },
        )
        .map_err(|err| PipelineError::Tuning(format!("boosted search failed: {err}")))?;
        debug!(?best, "refitting best boosted parameters");
        BoostedClassifier::fit(&best, features, labels)
            .map_err(|err| PipelineError::Tuning(format!("boosted refit failed: {err}")))
    }

    /// Train both families and return the one scoring higher on the held-out
    /// split.
    ///
    /// Each model is scored with AUC when the held-out labels contain two or
    /// more distinct classes, falling back to plain accuracy when they are
    /// constant; the fallback applies per model, not globally. A tie returns
    /// family A.
    pub fn select_best(
        &self,
        train_features: &FeatureMatrix,
        train_labels: &[Label],
        test_features: &FeatureMatrix,
        test_labels: &[Label],
    ) -> Result<TuningResult, PipelineError> {
        let forest = self.search_forest_params(train_features, train_labels)?;
        let forest_score = held_out_score(test_labels, &forest.predict(test_features));
        info!(family = %FamilyName::Forest, score = forest_score, "scored candidate family");

        let boosted = self.search_boosted_params(train_features, train_labels)?;
        let boosted_score = held_out_score(test_labels, &boosted.predict(test_features));
        info!(family = %FamilyName::Boosted, score = boosted_score, "scored candidate family");

        // Strictly higher wins; exact ties go to family A.
        if boosted_score > forest_score {
            Ok(TuningResult {
                family: FamilyName::Boosted,
                model: ClassifierModel::Boosted(boosted),
                score: boosted_score,
            })
        } else {
            Ok(TuningResult {
                family: FamilyName::Forest,
                model: ClassifierModel::Forest(forest),
                score: forest_score,
            })
        }
    }
}

/// AUC when the held-out labels have two or more classes, accuracy otherwise.
fn held_out_score(test_labels: &[Label], predicted: &[Label]) -> f64 {
    if distinct_labels(test_labels) >= 2 {
        auc(test_labels, predicted)
    } else {
        accuracy(test_labels, predicted)
    }
}

fn index_labels(labels: &[Label], indices: &[usize]) -> Vec<Label> {
    indices.iter().map(|&idx| labels[idx]).collect()
}
