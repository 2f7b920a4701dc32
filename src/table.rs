//! Tabular reader/writer collaborator used by file validation.

use std::path::Path;

use crate::errors::PipelineError;

/// An in-memory tabular file: one header row plus data rows of string cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    /// Column names in file order.
    pub header: Vec<String>,
    /// Data rows, each the same width as the header.
    pub rows: Vec<Vec<String>>,
}

/// True when a cell counts as missing (empty or whitespace-only).
pub fn cell_is_missing(cell: &str) -> bool {
    cell.trim().is_empty()
}

impl Table {
    /// Read a CSV file at `path` into memory, preserving header and row order.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|err| PipelineError::storage(path, err))?;
        let header = reader
            .headers()
            .map_err(|err| PipelineError::storage(path, err))?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| PipelineError::storage(path, err))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { header, rows })
    }

    /// Rewrite this table to `path`, header first, rows in order.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let mut writer =
            csv::Writer::from_path(path).map_err(|err| PipelineError::storage(path, err))?;
        writer
            .write_record(&self.header)
            .map_err(|err| PipelineError::storage(path, err))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|err| PipelineError::storage(path, err))?;
        }
        writer
            .flush()
            .map_err(|err| PipelineError::storage(path, err))?;
        Ok(())
    }

    /// Number of columns declared by the header.
    pub fn column_count(&self) -> usize {
        self.header.len()
    }

    /// True when every cell in column `idx` is missing.
    ///
    /// A column with zero data rows has no non-missing cells and counts as
    /// fully missing, matching the quarantine rule for empty files.
    pub fn column_is_all_missing(&self, idx: usize) -> bool {
        self.rows
            .iter()
            .all(|row| row.get(idx).is_none_or(|cell| cell_is_missing(cell)))
    }

    /// Index of the first fully-missing column, if any.
    pub fn first_all_missing_column(&self) -> Option<usize> {
        (0..self.column_count()).find(|idx| self.column_is_all_missing(*idx))
    }

    /// Replace every missing cell with `sentinel`, returning how many cells
    /// changed. Running this twice is a no-op the second time.
    pub fn replace_missing(&mut self, sentinel: &str) -> usize {
        let mut replaced = 0;
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if cell_is_missing(cell) {
                    *cell = sentinel.to_string();
                    replaced += 1;
                }
            }
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn read_preserves_header_and_row_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.csv");
        fs::write(&path, "empid,salary\nb,200\na,100\n").unwrap();
        let table = Table::read(&path).unwrap();
        assert_eq!(table.header, vec!["empid", "salary"]);
        assert_eq!(table.rows, vec![vec!["b", "200"], vec!["a", "100"]]);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn all_missing_column_is_detected() {
        let table = Table {
            header: vec!["empid".into(), "left".into()],
            rows: vec![
                vec!["e1".into(), "".into()],
                vec!["e2".into(), "  ".into()],
            ],
        };
        assert!(!table.column_is_all_missing(0));
        assert!(table.column_is_all_missing(1));
        assert_eq!(table.first_all_missing_column(), Some(1));
    }

    #[test]
    fn replace_missing_is_idempotent() {
        let mut table = Table {
            header: vec!["a".into(), "b".into()],
            rows: vec![vec!["1".into(), "".into()], vec!["".into(), "2".into()]],
        };
        assert_eq!(table.replace_missing("NULL"), 2);
        let after_first = table.clone();
        assert_eq!(table.replace_missing("NULL"), 0);
        assert_eq!(table, after_first);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table {
            header: vec!["empid".into(), "salary".into()],
            rows: vec![vec!["e1".into(), "NULL".into()]],
        };
        table.write(&path).unwrap();
        assert_eq!(Table::read(&path).unwrap(), table);
    }

    #[test]
    fn unreadable_path_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let err = Table::read(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
    }
}
