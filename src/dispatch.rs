//! Training and prediction orchestration across groups.
//!
//! Training fits the grouping model over the full feature set, partitions
//! records by assigned group, and delegates each group to the tuner; the
//! grouping model plus one winning classifier per group are persisted
//! through the registry. Prediction reproduces the same group assignment
//! for new records and dispatches each group's rows to its persisted
//! classifier.
//!
//! The dispatcher holds no model state between calls: every predict call
//! reloads artifacts from the registry, so a retrain is picked up
//! immediately.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::cluster::{GroupingModel, KMeans, KMeansConfig};
use crate::constants::layout::{RESULTS_FILENAME, RESULTS_SUFFIX};
use crate::constants::registry::GROUPING_MODEL_NAME;
use crate::errors::PipelineError;
use crate::features::FeatureMatrix;
use crate::learners::ClassifierModel;
use crate::registry::ModelRegistry;
use crate::scoring::distinct_labels;
use crate::tuning::{ModelTuner, TunerConfig};
use crate::types::{GroupId, Label, RecordId};
use crate::validation::sibling_with_suffix;

/// Declared holdout strategy for per-group tuning: a seeded shuffle split.
#[derive(Clone, Copy, Debug)]
pub struct HoldoutSplit {
    /// Fraction of each group's rows held out for model selection.
    pub test_fraction: f64,
    /// Seed for the shuffle; splitting is deterministic given the seed.
    pub seed: u64,
}

impl Default for HoldoutSplit {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            seed: 42,
        }
    }
}

impl HoldoutSplit {
    /// Split `0..len` into (train, test) index sets.
    ///
    /// Both sides must end up non-empty; a group too small for that is a
    /// tuning error because its classifier could not be selected. A fraction
    /// outside `(0, 1)` cannot produce two non-empty sides and is rejected
    /// up front.
    pub fn split(&self, len: usize) -> Result<(Vec<usize>, Vec<usize>), PipelineError> {
        if self.test_fraction <= 0.0 || self.test_fraction >= 1.0 {
            return Err(PipelineError::Configuration(format!(
                "holdout test fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);
        let test_len = ((len as f64) * self.test_fraction).round() as usize;
        let test_len = test_len.max(1);
        if test_len >= len {
            return Err(PipelineError::Tuning(format!(
                "group of {len} rows is too small for a {} holdout fraction",
                self.test_fraction
            )));
        }
        let test = indices.split_off(len - test_len);
        Ok((indices, test))
    }
}

/// Immutable dispatcher configuration, constructed once per pipeline.
#[derive(Clone, Debug, Default)]
pub struct DispatchConfig {
    /// Grouping model configuration.
    pub kmeans: KMeansConfig,
    /// Per-group holdout strategy.
    pub holdout: HoldoutSplit,
    /// Tuner configuration (grids, folds, seed).
    pub tuner: TunerConfig,
}

/// Orchestrates clustered training and group-routed prediction.
pub struct ClusterDispatcher {
    registry: ModelRegistry,
    config: DispatchConfig,
}

impl ClusterDispatcher {
    /// Create a dispatcher over `registry` with `config`.
    pub fn new(registry: ModelRegistry, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    /// Train the grouping model and one classifier per group, persisting
    /// every artifact under `run_id`.
    ///
    /// All-or-nothing per invocation: a failing group fails the call.
    /// Artifacts persisted for earlier groups remain on disk; callers that
    /// cannot tolerate partial state must retrain.
    pub fn train(
        &self,
        run_id: &str,
        features: &FeatureMatrix,
        labels: &[Label],
    ) -> Result<(), PipelineError> {
        if features.len() != labels.len() {
            return Err(PipelineError::Configuration(format!(
                "training set has {} rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        info!(run_id, records = features.len(), "training started");

        let grouping = KMeans::fit(&self.config.kmeans, features)?;
        self.registry.save(run_id, GROUPING_MODEL_NAME, &grouping)?;

        let tuner = ModelTuner::new(self.config.tuner.clone());
        for (group, indices) in group_rows(&grouping, features) {
            let group_labels: Vec<Label> = indices.iter().map(|&idx| labels[idx]).collect();
            if distinct_labels(&group_labels) < 2 {
                // A skipped group would be missing at prediction time, so a
                // degenerate label distribution fails the whole invocation.
                return Err(PipelineError::Tuning(format!(
                    "group {group} has a single label value across {} rows",
                    indices.len()
                )));
            }
            let group_features = features.select(&indices);
            let (train_idx, test_idx) = self.config.holdout.split(group_features.len())?;
            let result = tuner.select_best(
                &group_features.select(&train_idx),
                &index_labels(&group_labels, &train_idx),
                &group_features.select(&test_idx),
                &index_labels(&group_labels, &test_idx),
            )?;
            let name = ModelRegistry::resolve_classifier_name(group);
            info!(
                run_id,
                group,
                family = %result.family,
                score = result.score,
                rows = indices.len(),
                "persisting group classifier"
            );
            self.registry.save(run_id, &name, &result.model)?;
        }
        info!(run_id, "training finished");
        Ok(())
    }

    /// Predict one label per record, routing each record through the
    /// persisted grouping model to its group's classifier.
    ///
    /// Output is in grouped order, not input order; callers needing the
    /// original order must reorder by record id. A group with no persisted
    /// classifier surfaces as [`PipelineError::ModelNotFound`].
    pub fn predict(
        &self,
        run_id: &str,
        features: &FeatureMatrix,
    ) -> Result<Vec<(RecordId, Label)>, PipelineError> {
        let grouping: GroupingModel = self.registry.load(run_id, GROUPING_MODEL_NAME)?;
        let mut results = Vec::with_capacity(features.len());
        for (group, indices) in group_rows(&grouping, features) {
            let name = ModelRegistry::resolve_classifier_name(group);
            let classifier: ClassifierModel = match self.registry.load(run_id, &name) {
                Ok(model) => model,
                Err(err @ PipelineError::ModelNotFound { .. }) => {
                    warn!(run_id, group, "record group has no trained classifier");
                    return Err(err);
                }
                Err(err) => return Err(err),
            };
            let group_features = features.select(&indices);
            let predicted = classifier.predict(&group_features);
            results.extend(group_features.record_ids.into_iter().zip(predicted));
        }
        info!(run_id, predictions = results.len(), "prediction finished");
        Ok(results)
    }

    /// Predict the label of a single record.
    ///
    /// Identical group resolution and classifier loading as batch
    /// prediction, restricted to one row by construction. Models consume
    /// feature values positionally, so the one-row matrix is built with
    /// positional column names.
    pub fn predict_one(
        &self,
        run_id: &str,
        record_id: &str,
        row: &[f64],
    ) -> Result<Label, PipelineError> {
        let feature_names = (0..row.len()).map(|idx| format!("f{idx}")).collect();
        let features =
            FeatureMatrix::new(vec![record_id.to_string()], feature_names, vec![row.to_vec()])?;
        let predictions = self.predict(run_id, &features)?;
        predictions
            .into_iter()
            .next()
            .map(|(_, label)| label)
            .ok_or_else(|| {
                PipelineError::Configuration("prediction produced no output row".to_string())
            })
    }
}

/// Append predictions to `Predictions.csv` in the `_results` sibling of
/// `data_path`, writing the header only when the file is created.
pub fn write_results(
    data_path: impl AsRef<Path>,
    predictions: &[(RecordId, Label)],
) -> Result<PathBuf, PipelineError> {
    let results_dir = sibling_with_suffix(data_path.as_ref(), RESULTS_SUFFIX);
    fs::create_dir_all(&results_dir).map_err(|err| PipelineError::storage(&results_dir, err))?;
    let path = results_dir.join(RESULTS_FILENAME);
    let fresh = !path.exists();
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| PipelineError::storage(&path, err))?;
    let mut writer = csv::Writer::from_writer(file);
    if fresh {
        writer
            .write_record(["EmpId", "Prediction"])
            .map_err(|err| PipelineError::storage(&path, err))?;
    }
    for (record_id, label) in predictions {
        writer
            .write_record([record_id.as_str(), &label.to_string()])
            .map_err(|err| PipelineError::storage(&path, err))?;
    }
    writer
        .flush()
        .map_err(|err| PipelineError::storage(&path, err))?;
    Ok(path)
}

/// Row indices per distinct group, in ascending group order.
fn group_rows(grouping: &GroupingModel, features: &FeatureMatrix) -> IndexMap<GroupId, Vec<usize>> {
    let mut by_group: IndexMap<GroupId, Vec<usize>> = IndexMap::new();
    for (idx, group) in grouping.assign(features).into_iter().enumerate() {
        by_group.entry(group).or_default().push(idx);
    }
    by_group.sort_keys();
    by_group
}

fn index_labels(labels: &[Label], indices: &[usize]) -> Vec<Label> {
    indices.iter().map(|&idx| labels[idx]).collect()
}
