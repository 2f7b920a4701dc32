//! Structural validation and quarantine of incoming tabular files.
//!
//! Three ordered passes over a data directory: column-count conformance,
//! fully-missing-column detection, and missing-cell normalization. Each
//! pass snapshots the directory listing once and iterates the snapshot, so
//! moves never invalidate the iteration and a pass's effect set is
//! deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constants::layout::{REJECTS_SUFFIX, VALIDATION_SUFFIX};
use crate::constants::validation::{MISSING_SENTINEL, VALIDATED_FILENAME};
use crate::errors::PipelineError;
use crate::schema::SchemaContract;
use crate::table::Table;

/// Validates the files of one data directory against a schema contract,
/// quarantining non-conforming files into the `_rejects` sibling.
pub struct FileValidator {
    data_path: PathBuf,
}

impl FileValidator {
    /// Create a validator for `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    /// The quarantine directory: the data directory name suffixed `_rejects`.
    pub fn quarantine_path(&self) -> PathBuf {
        sibling_with_suffix(&self.data_path, REJECTS_SUFFIX)
    }

    /// The validated-output directory sibling.
    pub fn validation_path(&self) -> PathBuf {
        sibling_with_suffix(&self.data_path, VALIDATION_SUFFIX)
    }

    /// Run the full ordered validation pass: column count, then missing
    /// columns, then normalization. Rejected files are never normalized.
    pub fn run(&self, contract: &SchemaContract) -> Result<(), PipelineError> {
        self.validate_column_count(contract)?;
        self.validate_missing_columns()?;
        self.normalize_missing_cells()
    }

    /// Move every file whose column count differs from the contract to
    /// quarantine, unmodified. Conforming files are left untouched.
    ///
    /// An unreadable directory or a failed move aborts the remaining pass.
    pub fn validate_column_count(&self, contract: &SchemaContract) -> Result<(), PipelineError> {
        for path in self.snapshot()? {
            let table = Table::read(&path)?;
            if table.column_count() != contract.expected_column_count {
                warn!(
                    file = %path.display(),
                    found = table.column_count(),
                    expected = contract.expected_column_count,
                    "column count mismatch, quarantining file"
                );
                self.quarantine(&path)?;
            }
        }
        debug!(data_path = %self.data_path.display(), "column count validation finished");
        Ok(())
    }

    /// Quarantine every file containing at least one fully-missing column.
    ///
    /// The first fully-missing column is sufficient cause; a file moves at
    /// most once regardless of how many such columns it has.
    pub fn validate_missing_columns(&self) -> Result<(), PipelineError> {
        for path in self.snapshot()? {
            let table = Table::read(&path)?;
            if let Some(column) = table.first_all_missing_column() {
                warn!(
                    file = %path.display(),
                    column = %table.header.get(column).map(String::as_str).unwrap_or("?"),
                    "column has no values, quarantining file"
                );
                self.quarantine(&path)?;
            }
        }
        debug!(data_path = %self.data_path.display(), "missing column validation finished");
        Ok(())
    }

    /// Replace missing cells with the `NULL` sentinel and rewrite each file
    /// in place, preserving header and row order.
    ///
    /// Idempotent: a second run finds no missing cells and rewrites nothing.
    pub fn normalize_missing_cells(&self) -> Result<(), PipelineError> {
        for path in self.snapshot()? {
            let mut table = Table::read(&path)?;
            let replaced = table.replace_missing(MISSING_SENTINEL);
            if replaced > 0 {
                table.write(&path)?;
                info!(file = %path.display(), cells = replaced, "normalized missing cells");
            }
        }
        Ok(())
    }

    /// Merge every surviving file into a single validated CSV named
    /// `validated.csv` inside the `_validation` sibling.
    ///
    /// All survivors share the contract's column set by this point, so rows
    /// append under the first file's header.
    pub fn collect_validated(&self) -> Result<PathBuf, PipelineError> {
        let snapshot = self.snapshot()?;
        let mut merged: Option<Table> = None;
        for path in &snapshot {
            let table = Table::read(path)?;
            match merged.as_mut() {
                None => merged = Some(table),
                Some(target) => target.rows.extend(table.rows),
            }
        }
        let merged = merged.ok_or_else(|| {
            PipelineError::storage(&self.data_path, "no validated files to collect")
        })?;
        let out_dir = self.validation_path();
        fs::create_dir_all(&out_dir).map_err(|err| PipelineError::storage(&out_dir, err))?;
        let out_path = out_dir.join(VALIDATED_FILENAME);
        merged.write(&out_path)?;
        info!(
            merged = %out_path.display(),
            files = snapshot.len(),
            rows = merged.rows.len(),
            "collected validated files"
        );
        Ok(out_path)
    }

    /// Snapshot the data directory's file listing once, sorted by name so
    /// pass order is deterministic.
    fn snapshot(&self) -> Result<Vec<PathBuf>, PipelineError> {
        let entries =
            fs::read_dir(&self.data_path).map_err(|err| PipelineError::storage(&self.data_path, err))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PipelineError::storage(&self.data_path, err))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Move `path` into the quarantine directory, creating it lazily.
    fn quarantine(&self, path: &Path) -> Result<(), PipelineError> {
        let quarantine = self.quarantine_path();
        fs::create_dir_all(&quarantine)
            .map_err(|err| PipelineError::storage(&quarantine, err))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| PipelineError::storage(path, "file has no name"))?;
        let destination = quarantine.join(file_name);
        fs::rename(path, &destination).map_err(|err| PipelineError::storage(path, err))?;
        Ok(())
    }
}

/// Append `suffix` to the final component of `path`.
pub(crate) fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(suffix);
    path.with_file_name(name)
}
