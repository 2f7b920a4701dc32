//! Declarative schema contract for incoming tabular files.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::errors::PipelineError;

/// Expected column set and column count for a data path.
///
/// Immutable once loaded. `expected_column_count == column_names.len()` is
/// assumed from the backing source, not enforced here.
#[derive(Clone, Debug)]
pub struct SchemaContract {
    /// Expected column names, in file order.
    pub column_names: Vec<String>,
    /// Expected number of columns per file.
    pub expected_column_count: usize,
}

/// On-disk shape of the schema source document.
///
/// `colName` is an ordered map so the contract preserves file column order.
#[derive(Deserialize)]
struct SchemaDocument {
    #[serde(rename = "colName")]
    col_name: IndexMap<String, serde_json::Value>,
    #[serde(rename = "NumberofColumns")]
    number_of_columns: usize,
}

impl SchemaContract {
    /// Load the contract from a JSON schema document at `path`.
    ///
    /// An absent file, malformed JSON, or a missing required field is a
    /// [`PipelineError::Configuration`]. No side effects beyond the read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            PipelineError::Configuration(format!(
                "schema file '{}' is unreadable: {err}",
                path.display()
            ))
        })?;
        let document: SchemaDocument = serde_json::from_str(&raw).map_err(|err| {
            PipelineError::Configuration(format!(
                "schema file '{}' is malformed: {err}",
                path.display()
            ))
        })?;
        let column_names: Vec<String> = document.col_name.keys().cloned().collect();
        debug!(
            schema = %path.display(),
            columns = document.number_of_columns,
            "loaded schema contract"
        );
        Ok(Self {
            column_names,
            expected_column_count: document.number_of_columns,
        })
    }
}
