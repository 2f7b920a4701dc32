//! Feature matrix produced by feature extraction, consumed by training
//! and dispatch.

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::types::RecordId;

/// Rows of numeric feature values keyed by record identifier.
///
/// The record identifier is held beside the feature values, never inside
/// them, so models only ever see the feature columns while dispatch keeps
/// the identifier for result attribution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// One identifier per row.
    pub record_ids: Vec<RecordId>,
    /// Feature column names, in row order.
    pub feature_names: Vec<String>,
    /// One feature row per record, each `feature_names.len()` wide.
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Build a matrix, checking that ids and rows line up.
    pub fn new(
        record_ids: Vec<RecordId>,
        feature_names: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, PipelineError> {
        if record_ids.len() != rows.len() {
            return Err(PipelineError::Configuration(format!(
                "feature matrix has {} record ids but {} rows",
                record_ids.len(),
                rows.len()
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != feature_names.len()) {
            return Err(PipelineError::Configuration(format!(
                "feature row has {} values but {} feature names are declared",
                row.len(),
                feature_names.len()
            )));
        }
        Ok(Self {
            record_ids,
            feature_names,
            rows,
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the matrix holds no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of feature columns.
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Row subset at `indices`, ids and rows kept in lockstep.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            record_ids: indices
                .iter()
                .map(|&idx| self.record_ids[idx].clone())
                .collect(),
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|&idx| self.rows[idx].clone()).collect(),
        }
    }
}
