//! Clustered training followed by group-routed prediction against the same
//! registry, exercising the persisted grouping model and per-group
//! classifiers end to end.

use std::collections::HashSet;
use std::fs;

use tempfile::tempdir;

use clusterwise::{
    BoostedParams, ClusterDispatcher, DispatchConfig, FeatureMatrix, ForestParams, GroupingModel,
    HoldoutSplit, KMeansConfig, Label, MaxFeatures, ModelRegistry, PipelineError, SplitCriterion,
    TunerConfig,
};

/// Two well-separated blobs; inside each blob the label tracks the second
/// feature, so each group's classifier has something real to learn.
fn blob_dataset(per_blob: usize) -> (FeatureMatrix, Vec<Label>) {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for idx in 0..per_blob {
        let wiggle = (idx % 7) as f64 * 0.15;
        rows.push(vec![0.0 + wiggle, wiggle]);
        labels.push(Label::from(idx % 2 == 0));
        rows.push(vec![40.0 + wiggle, wiggle]);
        labels.push(Label::from(idx % 2 == 1));
    }
    let features = FeatureMatrix::new(
        (0..rows.len()).map(|idx| format!("emp_{idx}")).collect(),
        vec!["tenure".into(), "satisfaction".into()],
        rows,
    )
    .unwrap();
    (features, labels)
}

fn fast_config() -> DispatchConfig {
    DispatchConfig {
        kmeans: KMeansConfig {
            clusters: 2,
            max_iterations: 50,
            seed: 11,
        },
        holdout: HoldoutSplit {
            test_fraction: 0.25,
            seed: 11,
        },
        tuner: TunerConfig {
            forest_grid: vec![ForestParams {
                estimators: 9,
                criterion: SplitCriterion::Gini,
                max_depth: 3,
                max_features: MaxFeatures::Sqrt,
            }],
            boosted_grid: vec![BoostedParams {
                learning_rate: 0.5,
                max_depth: 2,
                estimators: 15,
            }],
            folds: 3,
            seed: 11,
        },
    }
}

#[test]
fn train_then_predict_covers_every_record_exactly_once() {
    let dir = tempdir().unwrap();
    let (features, labels) = blob_dataset(12);

    let dispatcher =
        ClusterDispatcher::new(ModelRegistry::on_disk(dir.path()), fast_config());
    dispatcher.train("run_1", &features, &labels).unwrap();

    let predictions = dispatcher.predict("run_1", &features).unwrap();
    assert_eq!(predictions.len(), features.len());

    let predicted_ids: HashSet<&str> = predictions
        .iter()
        .map(|(record_id, _)| record_id.as_str())
        .collect();
    assert_eq!(predicted_ids.len(), features.len(), "no duplicates or omissions");
    for record_id in &features.record_ids {
        assert!(predicted_ids.contains(record_id.as_str()));
    }
}

#[test]
fn prediction_reuses_the_training_time_group_assignment() {
    let dir = tempdir().unwrap();
    let (features, labels) = blob_dataset(12);

    let registry = ModelRegistry::on_disk(dir.path());
    let dispatcher = ClusterDispatcher::new(registry, fast_config());
    dispatcher.train("run_1", &features, &labels).unwrap();

    // The persisted grouping model is the single source of group identity:
    // assigning the training rows through it must match what any later
    // predict call computes.
    let registry = ModelRegistry::on_disk(dir.path());
    let grouping: GroupingModel = registry.load("run_1", "grouping").unwrap();
    let first = grouping.assign(&features);
    let second = grouping.assign(&features);
    assert_eq!(first, second);

    // Rows of the same blob share a group, and the blobs differ.
    assert_eq!(first[0], first[2]);
    assert_eq!(first[1], first[3]);
    assert_ne!(first[0], first[1]);
}

#[test]
fn single_record_prediction_returns_the_label_directly() {
    let dir = tempdir().unwrap();
    let (features, labels) = blob_dataset(12);

    let dispatcher =
        ClusterDispatcher::new(ModelRegistry::on_disk(dir.path()), fast_config());
    dispatcher.train("run_1", &features, &labels).unwrap();

    let label = dispatcher
        .predict_one("run_1", &features.record_ids[0], &features.rows[0])
        .unwrap();
    let batch = dispatcher.predict("run_1", &features.select(&[0])).unwrap();
    assert_eq!(label, batch[0].1);
}

#[test]
fn predicting_before_training_is_model_not_found() {
    let dir = tempdir().unwrap();
    let (features, _) = blob_dataset(4);

    let dispatcher =
        ClusterDispatcher::new(ModelRegistry::on_disk(dir.path()), fast_config());
    let err = dispatcher.predict("never_trained", &features).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModelNotFound { name, .. } if name == "grouping"
    ));
}

#[test]
fn group_without_a_trained_classifier_is_model_not_found() {
    let dir = tempdir().unwrap();
    let (features, labels) = blob_dataset(12);

    let dispatcher =
        ClusterDispatcher::new(ModelRegistry::on_disk(dir.path()), fast_config());
    dispatcher.train("run_1", &features, &labels).unwrap();

    // Simulate a prediction-time group that training never produced by
    // removing one group's persisted classifier.
    let orphaned = dir.path().join("run_1").join("classifier-1.json");
    assert!(orphaned.is_file());
    fs::remove_file(&orphaned).unwrap();

    let err = dispatcher.predict("run_1", &features).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModelNotFound { name, .. } if name == "classifier-1"
    ));
}

#[test]
fn single_label_group_fails_training_instead_of_skipping() {
    let dir = tempdir().unwrap();
    let (features, _) = blob_dataset(12);
    // Constant labels inside every group: tuning cannot select a classifier.
    let labels = vec![1; features.len()];

    let dispatcher =
        ClusterDispatcher::new(ModelRegistry::on_disk(dir.path()), fast_config());
    let err = dispatcher.train("run_1", &features, &labels).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Tuning(msg) if msg.contains("single label")
    ));
}

#[test]
fn retraining_overwrites_the_previous_run_artifacts() {
    let dir = tempdir().unwrap();
    let (features, labels) = blob_dataset(12);

    let dispatcher =
        ClusterDispatcher::new(ModelRegistry::on_disk(dir.path()), fast_config());
    dispatcher.train("run_1", &features, &labels).unwrap();
    let first = dispatcher.predict("run_1", &features).unwrap();

    dispatcher.train("run_1", &features, &labels).unwrap();
    let second = dispatcher.predict("run_1", &features).unwrap();
    assert_eq!(first, second);
}
