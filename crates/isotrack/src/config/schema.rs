use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::default_database_path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Stage A: where new jobs appear.
    #[serde(alias = "folder_a")]
    pub intake_directory: PathBuf,
    /// Stage B: the machine's input folder.
    #[serde(alias = "folder_b")]
    pub machine_directory: PathBuf,
    /// Stage C: durable storage for completed jobs.
    #[serde(alias = "folder_c")]
    pub archive_directory: PathBuf,
    /// Stage D: machine reports.
    #[serde(alias = "folder_d")]
    pub reports_directory: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_tracked_extension")]
    pub tracked_extension: String,
    #[serde(default = "default_report_pattern")]
    pub report_pattern: String,
    /// Country code hinting which legacy code page reports use when they
    /// are not UTF-8 (`pl` favours the Central European pages).
    #[serde(default = "default_report_region")]
    pub report_region: Option<String>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_tracked_extension() -> String {
    "iso".to_string()
}

fn default_report_pattern() -> String {
    "*.txt".to_string()
}

fn default_report_region() -> Option<String> {
    Some("pl".to_string())
}

impl ArchiverConfig {
    /// Config for the four stage directories with every other setting at its
    /// default.
    pub fn new(
        intake_directory: impl Into<PathBuf>,
        machine_directory: impl Into<PathBuf>,
        archive_directory: impl Into<PathBuf>,
        reports_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            intake_directory: intake_directory.into(),
            machine_directory: machine_directory.into(),
            archive_directory: archive_directory.into(),
            reports_directory: reports_directory.into(),
            database_path: None,
            tracked_extension: default_tracked_extension(),
            report_pattern: default_report_pattern(),
            report_region: default_report_region(),
            timing: TimingConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn directories(&self) -> [(&'static str, &Path); 4] {
        [
            ("intake_directory", self.intake_directory.as_path()),
            ("machine_directory", self.machine_directory.as_path()),
            ("archive_directory", self.archive_directory.as_path()),
            ("reports_directory", self.reports_directory.as_path()),
        ]
    }

    /// The configured database path, or `~/.isotrack/data/isotrack.db`.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(default_database_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.poll_interval_ms)
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_secs(self.timing.dwell_secs)
    }

    pub fn stability_check(&self) -> Duration {
        Duration::from_millis(self.timing.stability_check_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.db_busy_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.stop_timeout_secs)
    }

    /// Delay before the first retry; the poll interval unless overridden.
    pub fn base_backoff(&self) -> Duration {
        self.retry
            .base_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.poll_interval())
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.retry.max_backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Time a file must stay at the machine stage before it is archived.
    #[serde(default = "default_dwell_secs")]
    pub dwell_secs: u64,
    /// Pause between the two size readings of the intake stability check.
    #[serde(default = "default_stability_check_ms")]
    pub stability_check_ms: u64,
    #[serde(default = "default_db_busy_timeout_secs")]
    pub db_busy_timeout_secs: u64,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_dwell_secs() -> u64 {
    7 * 60
}

fn default_stability_check_ms() -> u64 {
    100
}

fn default_db_busy_timeout_secs() -> u64 {
    10
}

fn default_stop_timeout_secs() -> u64 {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            dwell_secs: default_dwell_secs(),
            stability_check_ms: default_stability_check_ms(),
            db_busy_timeout_secs: default_db_busy_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_backoff_ms: Option<u64>,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Failed archival attempts before a file is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_backoff_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: None,
            max_backoff_secs: default_max_backoff_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArchiverConfig::new("/a", "/b", "/c", "/d");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.dwell(), Duration::from_secs(420));
        assert_eq!(config.stability_check(), Duration::from_millis(100));
        assert_eq!(config.busy_timeout(), Duration::from_secs(10));
        assert_eq!(config.stop_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_backoff(), Duration::from_secs(300));
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.tracked_extension, "iso");
        assert_eq!(config.report_pattern, "*.txt");
    }

    #[test]
    fn test_base_backoff_follows_poll_interval() {
        let mut config = ArchiverConfig::new("/a", "/b", "/c", "/d");
        config.timing.poll_interval_ms = 500;
        assert_eq!(config.base_backoff(), Duration::from_millis(500));

        config.retry.base_backoff_ms = Some(50);
        assert_eq!(config.base_backoff(), Duration::from_millis(50));
    }

    #[test]
    fn test_resolved_database_path() {
        let mut config = ArchiverConfig::new("/a", "/b", "/c", "/d");
        assert!(config
            .resolved_database_path()
            .unwrap()
            .ends_with("isotrack.db"));

        config.database_path = Some(PathBuf::from("/var/lib/isotrack.db"));
        assert_eq!(
            config.resolved_database_path(),
            Some(PathBuf::from("/var/lib/isotrack.db"))
        );
    }
}
