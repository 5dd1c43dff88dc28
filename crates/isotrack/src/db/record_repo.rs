//! Operations on the `file_records` table.

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{pending_repo, Database, DatabaseError};
use crate::clock::format_timestamp;
use crate::extract::UNKNOWN;

/// One file that completed the intake → machine → archive pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Assigned by the store on insert.
    pub id: Option<i64>,
    pub file_name: String,
    pub intake_path: String,
    pub machine_path: String,
    pub archive_path: String,
    pub entered_intake_at: String,
    pub entered_machine_at: Option<String>,
    /// Never cleared once set.
    pub archived_at: Option<String>,
    pub cycle_duration: Option<String>,
    pub material: String,
    pub thickness: String,
    pub cnc_time: String,
}

impl FileRecord {
    /// A record with unknown machine metadata and no stage-B or archive times.
    pub fn new(
        file_name: impl Into<String>,
        intake_path: impl Into<String>,
        machine_path: impl Into<String>,
        archive_path: impl Into<String>,
        entered_intake_at: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            file_name: file_name.into(),
            intake_path: intake_path.into(),
            machine_path: machine_path.into(),
            archive_path: archive_path.into(),
            entered_intake_at: entered_intake_at.into(),
            entered_machine_at: None,
            archived_at: None,
            cycle_duration: None,
            material: UNKNOWN.to_string(),
            thickness: UNKNOWN.to_string(),
            cnc_time: UNKNOWN.to_string(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_name: row.get("file_name")?,
            intake_path: row.get("intake_path")?,
            machine_path: row.get("machine_path")?,
            archive_path: row.get("archive_path")?,
            entered_intake_at: row.get("entered_intake_at")?,
            entered_machine_at: row.get("entered_machine_at")?,
            archived_at: row.get("archived_at")?,
            cycle_duration: row.get("cycle_duration")?,
            material: row.get("material")?,
            thickness: row.get("thickness")?,
            cnc_time: row.get("cnc_time")?,
        })
    }
}

/// Machine-reported metadata for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CncMetadata {
    pub material: String,
    pub thickness: String,
    pub cnc_time: String,
}

impl Default for CncMetadata {
    fn default() -> Self {
        Self {
            material: UNKNOWN.to_string(),
            thickness: UNKNOWN.to_string(),
            cnc_time: UNKNOWN.to_string(),
        }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, file_name, intake_path, machine_path, archive_path,
     entered_intake_at, entered_machine_at, archived_at, cycle_duration,
     material, thickness, cnc_time FROM file_records";

/// Escapes `%`, `_` and `\` so the user's text is matched literally inside `LIKE`.
fn like_substring(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    escaped.push('%');
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Inserts a record and returns its new id.
///
/// Metadata that arrived for this file name before the record existed is
/// applied to the new row inside the same transaction.
pub fn insert(db: &Database, record: &FileRecord) -> Result<i64, DatabaseError> {
    db.with_tx(|conn| {
        conn.execute(
            "INSERT INTO file_records (file_name, intake_path, machine_path, archive_path,
             entered_intake_at, entered_machine_at, archived_at, cycle_duration,
             material, thickness, cnc_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.file_name,
                record.intake_path,
                record.machine_path,
                record.archive_path,
                record.entered_intake_at,
                record.entered_machine_at,
                record.archived_at,
                record.cycle_duration,
                record.material,
                record.thickness,
                record.cnc_time,
            ],
        )?;
        let id = conn.last_insert_rowid();

        if let Some(pending) = pending_repo::take(conn, &record.file_name)? {
            set_metadata(conn, id, &pending)?;
            log::info!(
                "Applied deferred report metadata to '{}' (record {})",
                record.file_name,
                id
            );
        }

        Ok(id)
    })
}

fn set_metadata(conn: &Connection, id: i64, meta: &CncMetadata) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE file_records SET material = ?2, thickness = ?3, cnc_time = ?4 WHERE id = ?1",
        params![id, meta.material, meta.thickness, meta.cnc_time],
    )?;
    Ok(())
}

/// Updates the machine metadata of the most recent record named `file_name`.
///
/// Returns `true` when a record was updated. When no record exists yet the
/// metadata is buffered and applied by a later [`insert`] of that name, and
/// `false` is returned. Timestamps are never touched.
pub fn update_metadata(
    db: &Database,
    file_name: &str,
    meta: &CncMetadata,
) -> Result<bool, DatabaseError> {
    db.with_tx(|conn| {
        let latest: Option<i64> = conn
            .query_row(
                "SELECT id FROM file_records WHERE file_name = ?1 ORDER BY id DESC LIMIT 1",
                params![file_name],
                |r| r.get(0),
            )
            .optional()?;

        match latest {
            Some(id) => {
                set_metadata(conn, id, meta)?;
                Ok(true)
            }
            None => {
                pending_repo::upsert(conn, file_name, meta, &format_timestamp(&Local::now()))?;
                Ok(false)
            }
        }
    })
}

/// Records whose file name contains `pattern`, newest archival first.
///
/// Rows with a NULL `archived_at` sort after every archived row (SQLite
/// orders NULL lowest); ties are broken by id, newest first.
pub fn search(db: &Database, pattern: &str) -> Result<Vec<FileRecord>, DatabaseError> {
    db.with_tx(|conn| {
        let sql = format!(
            "{} WHERE file_name LIKE ?1 ESCAPE '\\' ORDER BY archived_at DESC, id DESC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![like_substring(pattern)], FileRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// `(archive_path, file_name)` pairs for every record whose name contains `pattern`.
pub fn find_archive_paths(
    db: &Database,
    pattern: &str,
) -> Result<Vec<(String, String)>, DatabaseError> {
    db.with_tx(|conn| {
        let mut stmt = conn.prepare(
            "SELECT archive_path, file_name FROM file_records
             WHERE file_name LIKE ?1 ESCAPE '\\' ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![like_substring(pattern)], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Finds a record by its id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<FileRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], FileRecord::from_row)
            .optional()?)
    })
}

/// Total number of records.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM file_records", [], |r| r.get(0))?))
}
