//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order. Every migration SQL file is written with
//! `IF NOT EXISTS` so re-running against a partially initialised
//! database is harmless.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_file_records_table",
        sql: include_str!("sql/001_create_file_records.sql"),
    },
    Migration {
        version: 2,
        description: "create_pending_metadata_table",
        sql: include_str!("sql/002_create_pending_metadata.sql"),
    },
    Migration {
        version: 3,
        description: "archived_at_is_sticky",
        sql: include_str!("sql/003_archived_at_is_sticky.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'file_records'")
            .unwrap();
        stmt.query_map([], |r| r.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_lookup_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let names = index_names(&conn);
        assert!(names.contains(&"idx_file_records_file_name".to_string()));
        assert!(names.contains(&"idx_file_records_archived_at".to_string()));
    }

    #[test]
    fn test_metadata_defaults_to_unknown() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO file_records (file_name, intake_path, machine_path, archive_path, entered_intake_at)
             VALUES ('x.iso', '/a/x.iso', '/b/x.iso', '/c/x.iso', '2026-01-01 00:00:00')",
            [],
        )
        .unwrap();
        let (material, thickness, cnc_time): (String, String, String) = conn
            .query_row(
                "SELECT material, thickness, cnc_time FROM file_records",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(material, "unknown");
        assert_eq!(thickness, "unknown");
        assert_eq!(cnc_time, "unknown");
    }

    #[test]
    fn test_archived_at_cannot_be_cleared() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO file_records (file_name, intake_path, machine_path, archive_path, entered_intake_at, archived_at)
             VALUES ('x.iso', '/a/x.iso', '/b/x.iso', '/c/x.iso', '2026-01-01 00:00:00', '2026-01-01 00:10:00')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE file_records SET archived_at = NULL", []);
        assert!(result.is_err());

        conn.execute(
            "UPDATE file_records SET archived_at = '2026-01-01 00:11:00'",
            [],
        )
        .unwrap();
    }
}
