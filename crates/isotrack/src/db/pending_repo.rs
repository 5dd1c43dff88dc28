//! Buffer for report metadata that arrived before its file record existed.

use rusqlite::{params, Connection, OptionalExtension};

use super::record_repo::CncMetadata;
use super::{Database, DatabaseError};

/// Stores (or replaces) buffered metadata for `file_name`.
pub(crate) fn upsert(
    conn: &Connection,
    file_name: &str,
    meta: &CncMetadata,
    received_at: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pending_metadata (file_name, material, thickness, cnc_time, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(file_name) DO UPDATE SET
           material = excluded.material,
           thickness = excluded.thickness,
           cnc_time = excluded.cnc_time,
           received_at = excluded.received_at",
        params![
            file_name,
            meta.material,
            meta.thickness,
            meta.cnc_time,
            received_at
        ],
    )?;
    Ok(())
}

/// Removes and returns buffered metadata for `file_name`.
pub(crate) fn take(conn: &Connection, file_name: &str) -> Result<Option<CncMetadata>, DatabaseError> {
    let pending = conn
        .query_row(
            "SELECT material, thickness, cnc_time FROM pending_metadata WHERE file_name = ?1",
            params![file_name],
            |r| {
                Ok(CncMetadata {
                    material: r.get(0)?,
                    thickness: r.get(1)?,
                    cnc_time: r.get(2)?,
                })
            },
        )
        .optional()?;

    if pending.is_some() {
        conn.execute(
            "DELETE FROM pending_metadata WHERE file_name = ?1",
            params![file_name],
        )?;
    }
    Ok(pending)
}

/// Buffered metadata for `file_name`, if any.
pub fn find(db: &Database, file_name: &str) -> Result<Option<CncMetadata>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT material, thickness, cnc_time FROM pending_metadata WHERE file_name = ?1",
                params![file_name],
                |r| {
                    Ok(CncMetadata {
                        material: r.get(0)?,
                        thickness: r.get(1)?,
                        cnc_time: r.get(2)?,
                    })
                },
            )
            .optional()?)
    })
}

/// Number of buffered entries.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM pending_metadata", [], |r| r.get(0))?)
    })
}
