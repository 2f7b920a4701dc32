//! Dated archival of the auxiliary directories surrounding a data path.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::constants::layout::{ARCHIVE_CATEGORIES, ARCHIVE_SUFFIX, ARCHIVE_TIMESTAMP_FORMAT};
use crate::errors::PipelineError;
use crate::validation::sibling_with_suffix;

/// Relocates stale quarantine/validated/processed/results directories into
/// dated folders under the `_archive` sibling. Runs outside the hot path.
pub struct ArchiveRotator {
    data_path: PathBuf,
}

impl ArchiveRotator {
    /// Create a rotator for `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    /// The archive root: the data directory name suffixed `_archive`.
    pub fn archive_root(&self) -> PathBuf {
        sibling_with_suffix(&self.data_path, ARCHIVE_SUFFIX)
    }

    /// Archive every entry of each auxiliary directory that exists into
    /// `<category>_<date>_<time>` under the archive root.
    ///
    /// Absent source directories are nothing to archive, not an error.
    /// Existing destination entries are never overwritten; the offending
    /// entry is skipped instead. Any unexpected filesystem fault aborts the
    /// remainder of the pass.
    pub fn archive(&self) -> Result<(), PipelineError> {
        self.archive_at(Utc::now())
    }

    /// `archive` with an explicit timestamp, for deterministic tests.
    pub fn archive_at(&self, now: DateTime<Utc>) -> Result<(), PipelineError> {
        let stamp = now.format(ARCHIVE_TIMESTAMP_FORMAT).to_string();
        for (category, suffix) in ARCHIVE_CATEGORIES {
            let source = sibling_with_suffix(&self.data_path, suffix);
            if !source.is_dir() {
                debug!(category, "no source directory, nothing to archive");
                continue;
            }
            let destination = self.archive_root().join(format!("{category}_{stamp}"));
            rotate_category(&source, &destination, category)?;
        }
        Ok(())
    }
}

/// Move every entry of `source` into `destination`, creating the
/// destination lazily and skipping entries whose names already exist there.
///
/// The entry list is bound freshly from `source` here, never shared between
/// categories.
fn rotate_category(
    source: &Path,
    destination: &Path,
    category: &str,
) -> Result<(), PipelineError> {
    let entries = fs::read_dir(source).map_err(|err| PipelineError::storage(source, err))?;
    let mut moved = 0_usize;
    let mut skipped = 0_usize;
    for entry in entries {
        let entry = entry.map_err(|err| PipelineError::storage(source, err))?;
        if !destination.is_dir() {
            fs::create_dir_all(destination)
                .map_err(|err| PipelineError::storage(destination, err))?;
        }
        let target = destination.join(entry.file_name());
        if target.exists() {
            skipped += 1;
            continue;
        }
        fs::rename(entry.path(), &target)
            .map_err(|err| PipelineError::storage(entry.path(), err))?;
        moved += 1;
    }
    info!(category, moved, skipped, destination = %destination.display(), "archived category");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let data = dir.path().join("attrition_data");
        fs::create_dir(&data).unwrap();
        (dir, data)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 12, 9, 30, 15).unwrap()
    }

    #[test]
    fn archives_each_existing_category_into_dated_folders() {
        let (_dir, data) = setup();
        let rejects = sibling_with_suffix(&data, "_rejects");
        let results = sibling_with_suffix(&data, "_results");
        fs::create_dir(&rejects).unwrap();
        fs::create_dir(&results).unwrap();
        fs::write(rejects.join("bad.csv"), "x\n").unwrap();
        fs::write(results.join("Predictions.csv"), "y\n").unwrap();

        let rotator = ArchiveRotator::new(&data);
        rotator.archive_at(fixed_now()).unwrap();

        let archive = rotator.archive_root();
        assert!(archive
            .join("reject_2024-01-12_093015")
            .join("bad.csv")
            .is_file());
        assert!(archive
            .join("results_2024-01-12_093015")
            .join("Predictions.csv")
            .is_file());
        assert!(fs::read_dir(&rejects).unwrap().next().is_none());
    }

    #[test]
    fn absent_source_directories_are_tolerated() {
        let (_dir, data) = setup();
        ArchiveRotator::new(&data).archive_at(fixed_now()).unwrap();
        assert!(!ArchiveRotator::new(&data).archive_root().exists());
    }

    #[test]
    fn existing_destination_entries_are_never_overwritten() {
        let (_dir, data) = setup();
        let rejects = sibling_with_suffix(&data, "_rejects");
        fs::create_dir(&rejects).unwrap();
        fs::write(rejects.join("bad.csv"), "new contents\n").unwrap();

        let rotator = ArchiveRotator::new(&data);
        let destination = rotator.archive_root().join("reject_2024-01-12_093015");
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("bad.csv"), "original contents\n").unwrap();

        rotator.archive_at(fixed_now()).unwrap();

        let preserved = fs::read_to_string(destination.join("bad.csv")).unwrap();
        assert_eq!(preserved, "original contents\n");
        // The skipped source entry stays where it was.
        assert!(rejects.join("bad.csv").is_file());
    }

    #[test]
    fn later_absent_category_does_not_reuse_an_earlier_file_list() {
        // Rejects exists and has a file; validation does not exist. The
        // validation pass must move nothing.
        let (_dir, data) = setup();
        let rejects = sibling_with_suffix(&data, "_rejects");
        fs::create_dir(&rejects).unwrap();
        fs::write(rejects.join("bad.csv"), "x\n").unwrap();

        let rotator = ArchiveRotator::new(&data);
        rotator.archive_at(fixed_now()).unwrap();

        let archive = rotator.archive_root();
        assert!(archive.join("reject_2024-01-12_093015").is_dir());
        assert!(!archive.join("validation_2024-01-12_093015").exists());
    }

    #[test]
    fn rerunning_archival_is_idempotent_for_an_emptied_source() {
        let (_dir, data) = setup();
        let processed = sibling_with_suffix(&data, "_processed");
        fs::create_dir(&processed).unwrap();
        fs::write(processed.join("done.csv"), "x\n").unwrap();

        let rotator = ArchiveRotator::new(&data);
        rotator.archive_at(fixed_now()).unwrap();
        rotator.archive_at(fixed_now()).unwrap();

        let destination = rotator.archive_root().join("processed_2024-01-12_093015");
        assert!(destination.join("done.csv").is_file());
    }
}
