// ==========================================
// Scrap Recycling - Scrap Record Repository
// ==========================================
// Rule: no workflow policy here, only data mapping
// ==========================================

use crate::domain::scrap::{ScrapRecord, ScrapTotals};
use crate::domain::types::{ScrapClass, ScrapStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{fmt_ts, parse_enum, parse_ts};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const SCRAP_COLUMNS: &str = r#"
    scrap_id, scrap_class, quantity, unit, status,
    reporter, reason_code, notes, created_at,
    claimed_batch_id, updated_at
"#;

// ==========================================
// ScrapRecordRepository
// ==========================================
pub struct ScrapRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScrapRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Insert a new record
    pub fn insert(&self, record: &ScrapRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO scrap_record (
                scrap_id, scrap_class, quantity, unit, status,
                reporter, reason_code, notes, created_at,
                claimed_batch_id, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.scrap_id,
                record.scrap_class.to_db_str(),
                record.quantity,
                record.unit,
                record.status.to_db_str(),
                record.reporter,
                record.reason_code,
                record.notes,
                fmt_ts(&record.created_at),
                record.claimed_batch_id,
                fmt_ts(&record.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Find by id
    pub fn find_by_id(&self, scrap_id: &str) -> RepositoryResult<Option<ScrapRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM scrap_record WHERE scrap_id = ?1", SCRAP_COLUMNS);
        let record = conn
            .query_row(&sql, params![scrap_id], map_scrap_row)
            .optional()?;
        Ok(record)
    }

    /// List records, newest first, optionally filtered by status
    pub fn list(&self, status: Option<ScrapStatus>) -> RepositoryResult<Vec<ScrapRecord>> {
        let conn = self.get_conn()?;
        let records = match status {
            Some(s) => {
                let sql = format!(
                    "SELECT {} FROM scrap_record WHERE status = ?1 ORDER BY created_at DESC",
                    SCRAP_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![s.to_db_str()], map_scrap_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM scrap_record ORDER BY created_at DESC",
                    SCRAP_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], map_scrap_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    /// Records that count toward the uncollected totals (PENDING / CONFIRMED)
    pub fn find_uncollected(&self) -> RepositoryResult<Vec<ScrapRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM scrap_record WHERE status IN ('PENDING', 'CONFIRMED') ORDER BY created_at ASC",
            SCRAP_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_scrap_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Records claimed by a batch (any status)
    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<ScrapRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM scrap_record WHERE claimed_batch_id = ?1 ORDER BY created_at ASC",
            SCRAP_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![batch_id], map_scrap_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Uncollected totals grouped by class, computed in SQL
    pub fn sum_uncollected(&self) -> RepositoryResult<ScrapTotals> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT scrap_class, COALESCE(SUM(quantity), 0.0)
            FROM scrap_record
            WHERE status IN ('PENDING', 'CONFIRMED')
            GROUP BY scrap_class
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut totals = ScrapTotals::default();
        for row in rows {
            let (class, sum) = row?;
            match ScrapClass::from_str(&class) {
                Some(ScrapClass::Hard) => totals.hard_total = sum,
                Some(ScrapClass::Soft) => totals.soft_total = sum,
                None => {
                    return Err(RepositoryError::FieldValueError {
                        field: "scrap_class".to_string(),
                        message: format!("unknown class '{}'", class),
                    })
                }
            }
        }
        Ok(totals)
    }

    /// Guarded status transition
    ///
    /// Only updates when the current status is one of `from`; returns the
    /// number of rows changed (0 = record missing or in another state).
    /// Reporter notes are never touched.
    pub fn transition_status(
        &self,
        scrap_id: &str,
        from: &[ScrapStatus],
        to: ScrapStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let from_list = from
            .iter()
            .map(|s| format!("'{}'", s.to_db_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            UPDATE scrap_record
            SET status = ?2,
                updated_at = ?3
            WHERE scrap_id = ?1 AND status IN ({})
            "#,
            from_list
        );
        let rows = conn.execute(&sql, params![scrap_id, to.to_db_str(), fmt_ts(&now)])?;
        Ok(rows)
    }
}

// ==========================================
// Row mapping
// ==========================================

pub(crate) fn map_scrap_row(row: &Row<'_>) -> rusqlite::Result<ScrapRecord> {
    Ok(ScrapRecord {
        scrap_id: row.get(0)?,
        scrap_class: parse_enum(1, &row.get::<_, String>(1)?, ScrapClass::from_str)?,
        quantity: row.get(2)?,
        unit: row.get(3)?,
        status: parse_enum(4, &row.get::<_, String>(4)?, ScrapStatus::from_str)?,
        reporter: row.get(5)?,
        reason_code: row.get(6)?,
        notes: row.get(7)?,
        created_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        claimed_batch_id: row.get(9)?,
        updated_at: parse_ts(10, &row.get::<_, String>(10)?)?,
    })
}
