// ==========================================
// Scrap Recycling - SQLite Connection & Schema
// ==========================================
// - every connection gets the same PRAGMAs (foreign keys, busy_timeout)
// - ensure_schema is idempotent and runs at startup and in tests
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version written by `ensure_schema`
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Name of the partial unique index guarding the single active batch
pub const ACTIVE_BATCH_INDEX: &str = "ux_recycling_batch_single_active";

/// Apply the shared PRAGMAs
///
/// foreign_keys and busy_timeout are per-connection settings.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a connection with the shared PRAGMAs applied
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Read schema_version (None if the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Create all workflow tables and indexes if missing
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS recycling_batch (
            batch_id TEXT PRIMARY KEY,
            batch_number INTEGER NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK (status IN ('IN_PROGRESS', 'COMPLETED')),
            total_hard_scrap REAL NOT NULL,
            total_soft_scrap REAL NOT NULL,
            final_vt_quantity REAL,
            started_by TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_by TEXT,
            completed_at TEXT,
            notes TEXT
        );

        -- at most one IN_PROGRESS batch
        CREATE UNIQUE INDEX IF NOT EXISTS ux_recycling_batch_single_active
            ON recycling_batch(status) WHERE status = 'IN_PROGRESS';

        CREATE TABLE IF NOT EXISTS scrap_record (
            scrap_id TEXT PRIMARY KEY,
            scrap_class TEXT NOT NULL CHECK (scrap_class IN ('HARD', 'SOFT')),
            quantity REAL NOT NULL,
            unit TEXT NOT NULL,
            status TEXT NOT NULL,
            reporter TEXT NOT NULL,
            reason_code TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            claimed_batch_id TEXT REFERENCES recycling_batch(batch_id),
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_scrap_record_status ON scrap_record(status);
        CREATE INDEX IF NOT EXISTS idx_scrap_record_batch ON scrap_record(claimed_batch_id);

        CREATE TABLE IF NOT EXISTS drobilka_process (
            process_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES recycling_batch(batch_id),
            drobilka_type TEXT NOT NULL CHECK (drobilka_type IN ('HARD', 'SOFT')),
            input_quantity REAL NOT NULL,
            work_center TEXT NOT NULL,
            lead_operator TEXT NOT NULL,
            operators_json TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            output_quantity REAL
        );

        CREATE INDEX IF NOT EXISTS idx_drobilka_process_batch ON drobilka_process(batch_id);

        CREATE TABLE IF NOT EXISTS recycling (
            recycling_id TEXT PRIMARY KEY,
            scrap_id TEXT NOT NULL REFERENCES scrap_record(scrap_id),
            batch_id TEXT NOT NULL REFERENCES recycling_batch(batch_id),
            recycled_quantity REAL NOT NULL,
            recycled_by TEXT NOT NULL,
            recycled_at TEXT NOT NULL,
            notes TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_recycling_batch ON recycling(batch_id);
        CREATE INDEX IF NOT EXISTS idx_recycling_scrap ON recycling(scrap_id);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            batch_id TEXT,
            process_id TEXT,
            scrap_id TEXT,
            payload_json TEXT,
            detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
        CREATE INDEX IF NOT EXISTS idx_action_log_batch ON action_log(batch_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_second_in_progress_batch_is_rejected_by_index() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let insert = "INSERT INTO recycling_batch (batch_id, batch_number, status, total_hard_scrap, \
                      total_soft_scrap, started_by, started_at) VALUES (?1, ?2, 'IN_PROGRESS', 1, 1, 'op', 'now')";
        conn.execute(insert, rusqlite::params!["B1", 1]).unwrap();
        let err = conn.execute(insert, rusqlite::params!["B2", 2]).unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));
    }
}
