/// Unique identifier for one employee record (stable across runs).
/// Example: `emp_10482`
pub type RecordId = String;
/// Identifier scoping one training/prediction run and its artifacts.
/// Examples: `train_2024_01_12`, `7f3a`
pub type RunId = String;
/// Group identifier produced by the grouping model.
/// Examples: `0`, `1`, `2`
pub type GroupId = usize;
/// Class label for supervised training and prediction.
/// Examples: `0`, `1`
pub type Label = i64;
/// Name under which a model artifact is persisted.
/// Examples: `grouping`, `classifier-0`
pub type ModelName = String;
