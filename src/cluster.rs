//! Unsupervised grouping collaborator.
//!
//! Exposed through the narrow contract the pipeline relies on: fit a
//! grouping model over a feature matrix, then assign a group per record.
//! The fitted model is a serializable artifact so the registry can persist
//! it alongside the per-group classifiers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PipelineError;
use crate::features::FeatureMatrix;
use crate::types::GroupId;

/// Configuration for k-means grouping.
#[derive(Clone, Copy, Debug)]
pub struct KMeansConfig {
    /// Number of groups to partition records into.
    pub clusters: usize,
    /// Iteration cap for centroid refinement.
    pub max_iterations: usize,
    /// RNG seed for centroid initialization; fitting is deterministic
    /// given the seed and input order.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            clusters: 3,
            max_iterations: 100,
            seed: 42,
        }
    }
}

/// Fitted grouping model: one centroid per group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupingModel {
    centroids: Vec<Vec<f64>>,
}

impl GroupingModel {
    /// Number of groups this model can assign.
    pub fn group_count(&self) -> usize {
        self.centroids.len()
    }

    /// Assign each record its nearest-centroid group.
    ///
    /// Distance ties resolve toward the lower group id, so assignment is
    /// stable across calls for identical input.
    pub fn assign(&self, features: &FeatureMatrix) -> Vec<GroupId> {
        features
            .rows
            .iter()
            .map(|row| self.nearest_centroid(row))
            .collect()
    }

    fn nearest_centroid(&self, row: &[f64]) -> GroupId {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (group, centroid) in self.centroids.iter().enumerate() {
            let distance = squared_distance(row, centroid);
            if distance < best_distance {
                best = group;
                best_distance = distance;
            }
        }
        best
    }
}

/// K-means fitting entry point.
pub struct KMeans;

impl KMeans {
    /// Fit a grouping model over the feature rows of `features`.
    ///
    /// Fails with a configuration error when there are fewer rows than
    /// requested groups or the group count is zero.
    pub fn fit(
        config: &KMeansConfig,
        features: &FeatureMatrix,
    ) -> Result<GroupingModel, PipelineError> {
        if config.clusters == 0 {
            return Err(PipelineError::Configuration(
                "grouping requires at least one cluster".to_string(),
            ));
        }
        if features.len() < config.clusters {
            return Err(PipelineError::Configuration(format!(
                "{} records cannot seed {} clusters",
                features.len(),
                config.clusters
            )));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut seed_indices: Vec<usize> = (0..features.len()).collect();
        seed_indices.shuffle(&mut rng);
        let mut centroids: Vec<Vec<f64>> = seed_indices[..config.clusters]
            .iter()
            .map(|&idx| features.rows[idx].clone())
            .collect();

        let mut assignments = vec![0_usize; features.len()];
        for iteration in 0..config.max_iterations {
            let model = GroupingModel {
                centroids: centroids.clone(),
            };
            let next = model.assign(features);
            if next == assignments && iteration > 0 {
                debug!(iteration, "k-means converged");
                break;
            }
            assignments = next;
            centroids = recompute_centroids(features, &assignments, &centroids);
        }

        Ok(GroupingModel { centroids })
    }
}

fn recompute_centroids(
    features: &FeatureMatrix,
    assignments: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let width = features.feature_count();
    let mut sums = vec![vec![0.0_f64; width]; previous.len()];
    let mut counts = vec![0_usize; previous.len()];
    for (row, &group) in features.rows.iter().zip(assignments) {
        counts[group] += 1;
        for (total, value) in sums[group].iter_mut().zip(row) {
            *total += value;
        }
    }
    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(group, (sum, count))| {
            if count == 0 {
                // An emptied cluster keeps its previous centroid.
                previous[group].clone()
            } else {
                sum.into_iter().map(|total| total / count as f64).collect()
            }
        })
        .collect()
}

fn squared_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter()
        .zip(rhs)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}
