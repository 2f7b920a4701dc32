use std::io;

use thiserror::Error;

use crate::types::{ModelName, RunId};

/// Error type for configuration, storage, tuning, and registry failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or inconsistent configuration, schema, or input shape.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A filesystem operation failed at a known path.
    #[error("storage failure at '{path}': {reason}")]
    Storage {
        /// Path the failing operation targeted.
        path: String,
        /// Displayable cause of the failure.
        reason: String,
    },
    /// An I/O error with no more specific context.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Hyperparameter search or model selection failed.
    #[error("tuning failure: {0}")]
    Tuning(String),
    /// A requested model artifact is not persisted for the run.
    #[error("model '{name}' not found for run '{run_id}'")]
    ModelNotFound {
        /// Run whose artifacts were searched.
        run_id: RunId,
        /// Artifact name that was requested.
        name: ModelName,
    },
}

impl PipelineError {
    /// Build a `Storage` error from a path-like value and a displayable cause.
    pub fn storage(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::Storage {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
