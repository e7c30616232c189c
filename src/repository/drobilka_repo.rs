// ==========================================
// Scrap Recycling - Drobilka Process Repository
// ==========================================
// Rule: no workflow policy here, only data mapping
// completed_at is written once through a guarded UPDATE
// ==========================================

use crate::domain::drobilka::DrobilkaProcess;
use crate::domain::types::DrobilkaType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{fmt_ts, parse_enum, parse_opt_ts, parse_ts};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const PROCESS_COLUMNS: &str = r#"
    process_id, batch_id, drobilka_type, input_quantity,
    work_center, lead_operator, operators_json,
    started_at, completed_at, output_quantity
"#;

pub struct DrobilkaProcessRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DrobilkaProcessRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, process: &DrobilkaProcess) -> RepositoryResult<()> {
        let operators_json = serde_json::to_string(&process.operators)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO drobilka_process (
                process_id, batch_id, drobilka_type, input_quantity,
                work_center, lead_operator, operators_json,
                started_at, completed_at, output_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                process.process_id,
                process.batch_id,
                process.drobilka_type.to_db_str(),
                process.input_quantity,
                process.work_center,
                process.lead_operator,
                operators_json,
                fmt_ts(&process.started_at),
                process.completed_at.as_ref().map(fmt_ts),
                process.output_quantity,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, process_id: &str) -> RepositoryResult<Option<DrobilkaProcess>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM drobilka_process WHERE process_id = ?1",
            PROCESS_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![process_id], map_process_row)
            .optional()?)
    }

    /// Runs of one batch, oldest first
    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<DrobilkaProcess>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM drobilka_process WHERE batch_id = ?1 ORDER BY started_at ASC, process_id ASC",
            PROCESS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![batch_id], map_process_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All runs, newest first
    pub fn list_all(&self) -> RepositoryResult<Vec<DrobilkaProcess>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM drobilka_process ORDER BY started_at DESC, process_id ASC",
            PROCESS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_process_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Set completed_at/output on an active run
    ///
    /// Returns the number of rows changed; 0 means the run is missing or
    /// already completed.
    pub fn mark_completed(
        &self,
        process_id: &str,
        output_quantity: f64,
        completed_at: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE drobilka_process
            SET completed_at = ?2, output_quantity = ?3
            WHERE process_id = ?1 AND completed_at IS NULL
            "#,
            params![process_id, fmt_ts(&completed_at), output_quantity],
        )?;
        Ok(rows)
    }
}

fn map_process_row(row: &Row<'_>) -> rusqlite::Result<DrobilkaProcess> {
    let operators_json: String = row.get(6)?;
    let operators: Vec<String> = serde_json::from_str(&operators_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(DrobilkaProcess {
        process_id: row.get(0)?,
        batch_id: row.get(1)?,
        drobilka_type: parse_enum(2, &row.get::<_, String>(2)?, DrobilkaType::from_str)?,
        input_quantity: row.get(3)?,
        work_center: row.get(4)?,
        lead_operator: row.get(5)?,
        operators,
        started_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        completed_at: parse_opt_ts(8, row.get(8)?)?,
        output_quantity: row.get(9)?,
    })
}
