/// Constants used by the sibling-directory layout convention.
///
/// For a data path `P`, the validator and archive rotator agree on the
/// siblings `P_rejects`, `P_validation`, `P_processed`, `P_results`, and
/// `P_archive`.
pub mod layout {
    /// Suffix of the quarantine directory holding rejected files.
    pub const REJECTS_SUFFIX: &str = "_rejects";
    /// Suffix of the directory holding merged validated output.
    pub const VALIDATION_SUFFIX: &str = "_validation";
    /// Suffix of the directory holding files that finished processing.
    pub const PROCESSED_SUFFIX: &str = "_processed";
    /// Suffix of the directory holding prediction result files.
    pub const RESULTS_SUFFIX: &str = "_results";
    /// Suffix of the archive root directory.
    pub const ARCHIVE_SUFFIX: &str = "_archive";
    /// Archive subfolder categories, paired with their source suffix,
    /// in rotation order.
    pub const ARCHIVE_CATEGORIES: [(&str, &str); 4] = [
        ("reject", REJECTS_SUFFIX),
        ("validation", VALIDATION_SUFFIX),
        ("processed", PROCESSED_SUFFIX),
        ("results", RESULTS_SUFFIX),
    ];
    /// `chrono` format string for archive subfolder timestamps
    /// (date plus second-resolution time).
    pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";
    /// File name of the merged prediction output inside the results directory.
    pub const RESULTS_FILENAME: &str = "Predictions.csv";
}

/// Constants used by file validation and cell normalization.
pub mod validation {
    /// Sentinel written in place of missing cells during normalization.
    pub const MISSING_SENTINEL: &str = "NULL";
    /// File name of the merged validated output.
    pub const VALIDATED_FILENAME: &str = "validated.csv";
}

/// Constants used by model-registry naming and persisted payloads.
pub mod registry {
    /// Artifact name of the persisted grouping model.
    pub const GROUPING_MODEL_NAME: &str = "grouping";
    /// Prefix of per-group classifier artifact names (`classifier-<group>`).
    pub const CLASSIFIER_NAME_PREFIX: &str = "classifier-";
    /// File extension of persisted artifacts.
    pub const ARTIFACT_EXTENSION: &str = "json";
    /// Version tag for persisted artifact envelopes.
    pub const ARTIFACT_VERSION: u32 = 1;
}

/// Constants used by hyperparameter search defaults.
pub mod tuning {
    /// Cross-validation fold count used by grid search.
    pub const DEFAULT_FOLDS: usize = 5;
    /// Estimator counts searched for the tree-ensemble family.
    pub const FOREST_ESTIMATORS: [usize; 4] = [10, 50, 100, 130];
    /// Max depths searched for the tree-ensemble family.
    pub const FOREST_MAX_DEPTHS: [usize; 2] = [2, 3];
    /// Learning rates searched for the gradient-boosted family.
    pub const BOOSTED_LEARNING_RATES: [f64; 4] = [0.5, 0.1, 0.01, 0.001];
    /// Max depths searched for the gradient-boosted family.
    pub const BOOSTED_MAX_DEPTHS: [usize; 4] = [3, 5, 10, 20];
    /// Estimator counts searched for the gradient-boosted family.
    pub const BOOSTED_ESTIMATORS: [usize; 4] = [10, 50, 100, 200];
}
