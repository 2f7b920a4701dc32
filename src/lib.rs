#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Dated archival of auxiliary directories.
pub mod archive;
/// Unsupervised grouping collaborator.
pub mod cluster;
/// Centralized constants for directory layout, registry naming, and tuning.
pub mod constants;
/// Training and prediction orchestration across groups.
pub mod dispatch;
/// Feature matrix types.
pub mod features;
/// Supervised classifier families.
pub mod learners;
/// Persisted model registry.
pub mod registry;
/// Schema contract loading.
pub mod schema;
/// Scoring helpers.
pub mod scoring;
/// Grid search with cross-validation.
pub mod search;
/// Tabular reader/writer collaborator.
pub mod table;
/// Hyperparameter tuning and best-model selection.
pub mod tuning;
/// Shared type aliases.
pub mod types;
/// File validation and quarantine.
pub mod validation;

mod errors;

pub use archive::ArchiveRotator;
pub use cluster::{GroupingModel, KMeans, KMeansConfig};
pub use dispatch::{write_results, ClusterDispatcher, DispatchConfig, HoldoutSplit};
pub use errors::PipelineError;
pub use features::FeatureMatrix;
pub use learners::{
    BoostedClassifier, BoostedParams, ClassifierModel, ForestClassifier, ForestParams,
    MaxFeatures, SplitCriterion,
};
pub use registry::{ArtifactStore, FsArtifactStore, ModelRegistry};
pub use schema::SchemaContract;
pub use table::Table;
pub use tuning::{FamilyName, ModelTuner, TunerConfig, TuningResult};
pub use types::{GroupId, Label, ModelName, RecordId, RunId};
pub use validation::FileValidator;
