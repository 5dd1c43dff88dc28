//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite). Every operation opens its own short-lived
//! connection with a fixed busy timeout, so concurrent readers and the single
//! engine writer never share connection state. A contended lock surfaces as
//! an error after the timeout instead of blocking forever.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod migrations;
pub mod pending_repo;
pub mod record_repo;

pub use error::DatabaseError;
pub use record_repo::{CncMetadata, FileRecord};

/// Busy timeout applied to every connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the record store.
///
/// Cloning is cheap (inner `Arc`). The handle only carries the location and
/// timeout; connections are opened per operation.
#[derive(Clone, Debug)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

#[derive(Debug)]
struct DatabaseInner {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`Database::open`] with an explicit busy timeout.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db = Self {
            inner: Arc::new(DatabaseInner {
                path: path.to_path_buf(),
                busy_timeout,
            }),
        };

        db.init()?;
        log::info!("Database opened at {}", path.display());

        Ok(db)
    }

    /// Idempotently creates tables and indexes. Safe to call repeatedly.
    pub fn init(&self) -> Result<(), DatabaseError> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrations::run_all(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = Connection::open(&self.inner.path)?;
        conn.busy_timeout(self.inner.busy_timeout)?;
        Ok(conn)
    }

    /// Runs `f` on a fresh connection without an explicit transaction.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    /// Runs `f` inside a transaction on a fresh connection. The transaction
    /// commits only when `f` returns `Ok`; otherwise it is rolled back.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Returns the canonical database path: `~/.isotrack/data/isotrack.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".isotrack").join("data").join("isotrack.db"))
}
