use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

/// `<dst>.tmp`, the staging name used while a copy is in progress.
pub fn temp_path_for(dst: &Path) -> PathBuf {
    let mut name: OsString = dst.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn file_len(path: &Path) -> Result<u64, ArchiveError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| ArchiveError::io(path, e))
}

/// Moves `src` to `dst` so that an observer always sees the file in at
/// least one of the two places.
///
/// The file is copied to `<dst>.tmp`, the copy's size is checked against the
/// source, the temp file is renamed over `dst`, `dst` is checked, and only
/// then is `src` removed. On any failure before the removal, `src` is left
/// untouched and the temp file is deleted. Returns the number of bytes moved.
pub fn verified_move(src: &Path, dst: &Path) -> Result<u64, ArchiveError> {
    let tmp = temp_path_for(dst);

    match stage_and_publish(src, dst, &tmp) {
        Ok(len) => {
            std::fs::remove_file(src).map_err(|e| ArchiveError::io(src, e))?;
            Ok(len)
        }
        Err(e) => {
            if tmp.exists() {
                if let Err(cleanup) = std::fs::remove_file(&tmp) {
                    log::warn!(
                        "Failed to remove temp file {}: {}",
                        tmp.display(),
                        cleanup
                    );
                }
            }
            Err(e)
        }
    }
}

fn stage_and_publish(src: &Path, dst: &Path, tmp: &Path) -> Result<u64, ArchiveError> {
    let source_len = file_len(src)?;

    std::fs::copy(src, tmp).map_err(|e| ArchiveError::io(tmp, e))?;

    if !tmp.exists() {
        return Err(ArchiveError::integrity(tmp, "temp file was not created"));
    }
    let copied_len = file_len(tmp)?;
    if copied_len != source_len {
        return Err(ArchiveError::integrity(
            tmp,
            format!(
                "size mismatch after copy: source {} bytes, copy {} bytes",
                source_len, copied_len
            ),
        ));
    }

    // Atomic on the same filesystem; replaces an existing archive copy.
    std::fs::rename(tmp, dst).map_err(|e| ArchiveError::io(dst, e))?;

    if !dst.exists() {
        return Err(ArchiveError::integrity(dst, "archive file missing after rename"));
    }

    Ok(source_len)
}
