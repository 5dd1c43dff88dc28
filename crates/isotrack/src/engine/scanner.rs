use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use log::{debug, trace};
use walkdir::WalkDir;

use crate::error::{ArchiveError, ConfigError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Lists the regular files directly inside one directory whose names match a
/// glob, case-insensitively.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    directory: PathBuf,
    pattern: Pattern,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(directory: P, pattern: Pattern) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            pattern,
        }
    }

    pub fn with_glob<P: AsRef<Path>>(directory: P, glob: &str) -> Result<Self, ConfigError> {
        let pattern = Pattern::new(glob).map_err(|e| ConfigError::InvalidPattern {
            pattern: glob.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(directory, pattern))
    }

    /// Scanner for `*.<extension>`.
    pub fn for_extension<P: AsRef<Path>>(
        directory: P,
        extension: &str,
    ) -> Result<Self, ConfigError> {
        Self::with_glob(directory, &format!("*.{}", Pattern::escape(extension)))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.matches_with(file_name, MATCH_OPTIONS)
    }

    /// Returns matching files sorted by name. Fails only when the directory
    /// itself cannot be read; unreadable entries are skipped.
    pub fn scan(&self) -> Result<Vec<PathBuf>, walkdir::Error> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 || e.path() == Some(self.directory.as_path()) => {
                    return Err(e);
                }
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", self.directory.display(), e);
                    continue;
                }
            };

            let Some(name) = entry.file_name().to_str() else {
                trace!("Skipping non UTF-8 name: {:?}", entry.file_name());
                continue;
            };
            if !self.matches(name) {
                continue;
            }

            // Follows symlinks, so a link to a regular file counts.
            if !entry.path().is_file() {
                continue;
            }

            files.push(entry.into_path());
        }

        Ok(files)
    }
}

/// Size-based stability check: the file is stable when two size readings
/// `interval` apart agree.
pub fn is_stable(path: &Path, interval: Duration) -> Result<bool, ArchiveError> {
    let size = |p: &Path| {
        std::fs::metadata(p)
            .map(|m| m.len())
            .map_err(|e| ArchiveError::io(p, e))
    };

    let initial = size(path)?;
    if !interval.is_zero() {
        std::thread::sleep(interval);
    }
    Ok(size(path)? == initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_scan_matches_extension_case_insensitively() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("job1.iso"), "a").unwrap();
        std::fs::write(temp_dir.path().join("JOB2.ISO"), "b").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "c").unwrap();
        std::fs::write(temp_dir.path().join("job3.iso.tmp"), "d").unwrap();

        let scanner = DirectoryScanner::for_extension(temp_dir.path(), "iso").unwrap();
        let files = scanner.scan().unwrap();

        assert_eq!(names(&files), vec!["JOB2.ISO", "job1.iso"]);
    }

    #[test]
    fn test_scan_skips_directories_and_nested_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("folder.iso")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        std::fs::write(temp_dir.path().join("sub").join("deep.iso"), "x").unwrap();
        std::fs::write(temp_dir.path().join("top.iso"), "x").unwrap();

        let scanner = DirectoryScanner::for_extension(temp_dir.path(), "iso").unwrap();
        assert_eq!(names(&scanner.scan().unwrap()), vec!["top.iso"]);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let scanner =
            DirectoryScanner::for_extension(temp_dir.path().join("missing"), "iso").unwrap();
        assert!(scanner.scan().is_err());
    }

    #[test]
    fn test_with_glob_rejects_invalid_pattern() {
        assert!(matches!(
            DirectoryScanner::with_glob("/d", "[").unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_report_glob() {
        let scanner = DirectoryScanner::with_glob("/d", "*.txt").unwrap();
        assert!(scanner.matches("#job1.iso.txt"));
        assert!(scanner.matches("REPORT.TXT"));
        assert!(!scanner.matches("job1.iso"));
    }

    #[test]
    fn test_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("job1.iso");
        std::fs::write(&path, "G00").unwrap();
        assert!(is_stable(&path, Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn test_is_stable_detects_growth() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("job1.iso");
        std::fs::write(&path, "G00").unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            std::fs::write(&writer_path, "G00 X1 Y1 Z1").unwrap();
        });

        let stable = is_stable(&path, Duration::from_millis(200)).unwrap();
        writer.join().unwrap();
        assert!(!stable);
    }

    #[test]
    fn test_is_stable_missing_file_is_transient() {
        let temp_dir = TempDir::new().unwrap();
        let result = is_stable(&temp_dir.path().join("gone.iso"), Duration::ZERO);
        assert!(matches!(result, Err(ArchiveError::TransientIo { .. })));
    }
}
