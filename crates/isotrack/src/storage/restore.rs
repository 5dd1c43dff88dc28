use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::db::{record_repo, Database};
use crate::error::{ArchiveError, Result};

/// Outcome of copying archived jobs back into intake.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    /// Paths written in the intake directory.
    pub restored: Vec<PathBuf>,
    /// Archive paths recorded in the store but absent on disk.
    pub missing: Vec<PathBuf>,
}

/// Intake path for a restored file; never overwrites an existing file.
fn restore_target(intake_dir: &Path, file_name: &str, now: &DateTime<Local>) -> PathBuf {
    let path = intake_dir.join(file_name);
    if std::fs::symlink_metadata(&path).is_err() {
        return path;
    }

    let (base, ext) = match file_name.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&file_name[..dot_pos], &file_name[dot_pos..]),
        _ => (file_name, ""),
    };
    intake_dir.join(format!(
        "{}_restored_{}{}",
        base,
        now.format("%Y%m%d_%H%M%S"),
        ext
    ))
}

/// Copies every archived file whose name contains `pattern` back into
/// `intake_dir`. The archive copy is left in place.
pub fn restore_matching(db: &Database, pattern: &str, intake_dir: &Path) -> Result<RestoreReport> {
    restore_matching_at(db, pattern, intake_dir, &Local::now())
}

pub(crate) fn restore_matching_at(
    db: &Database,
    pattern: &str,
    intake_dir: &Path,
    now: &DateTime<Local>,
) -> Result<RestoreReport> {
    let mut report = RestoreReport::default();

    for (archive_path, file_name) in record_repo::find_archive_paths(db, pattern)? {
        let archive_path = PathBuf::from(archive_path);
        if !archive_path.is_file() {
            log::warn!(
                "Archived file recorded in the store is missing on disk: {}",
                archive_path.display()
            );
            report.missing.push(archive_path);
            continue;
        }

        let target = restore_target(intake_dir, &file_name, now);
        std::fs::copy(&archive_path, &target).map_err(|e| ArchiveError::io(&target, e))?;
        log::info!(
            "Restored {} -> {}",
            archive_path.display(),
            target.display()
        );
        report.restored.push(target);
    }

    Ok(report)
}
