use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IsotrackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archival error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Failures of a single file's archival transition.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The file or a folder could not be read; the next tick retries.
    #[error("Transient I/O failure on '{path}': {source}")]
    TransientIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy could not be verified; the source is left untouched.
    #[error("Integrity check failed for '{path}': {reason}")]
    Integrity { path: PathBuf, reason: String },

    #[error("Failed to persist archival record: {0}")]
    Storage(#[from] crate::db::DatabaseError),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::TransientIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn integrity(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Integrity {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failures while ingesting a machine report. Each one skips only that report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report name '{0}' does not follow the '#<name>.iso.txt' convention")]
    UnrecognizedName(String),

    #[error("Failed to read report '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list report directory '{path}': {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Failed to spawn engine thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Engine did not stop within {0:?}")]
    StopTimeout(std::time::Duration),

    #[error("Engine thread panicked")]
    Panicked,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, IsotrackError>;
