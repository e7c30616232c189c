// ==========================================
// Scrap Recycling - Recycling Batch Repository
// ==========================================
// Rule: no workflow policy here. Multi-table writes (batch start with
// scrap claims, batch completion with recycling rows) run in one
// IMMEDIATE transaction so a failure leaves nothing half-applied.
// ==========================================

use crate::domain::batch::RecyclingBatch;
use crate::domain::recycling::Recycling;
use crate::domain::types::BatchStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{fmt_ts, parse_enum, parse_opt_ts, parse_ts};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

const BATCH_COLUMNS: &str = r#"
    batch_id, batch_number, status,
    total_hard_scrap, total_soft_scrap, final_vt_quantity,
    started_by, started_at, completed_by, completed_at, notes
"#;

/// Completion data written by `complete_with_recyclings`
#[derive(Debug, Clone)]
pub struct BatchCompletion<'a> {
    pub batch_id: &'a str,
    pub final_vt_quantity: f64,
    pub notes: Option<&'a str>,
    pub completed_by: &'a str,
    pub completed_at: DateTime<Utc>,
}

// ==========================================
// RecyclingBatchRepository
// ==========================================
pub struct RecyclingBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RecyclingBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // Queries
    // ==========================================

    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<RecyclingBatch>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM recycling_batch WHERE batch_id = ?1", BATCH_COLUMNS);
        Ok(conn.query_row(&sql, params![batch_id], map_batch_row).optional()?)
    }

    /// The IN_PROGRESS batch, if any
    pub fn find_active(&self) -> RepositoryResult<Option<RecyclingBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM recycling_batch WHERE status = 'IN_PROGRESS' ORDER BY batch_number DESC LIMIT 1",
            BATCH_COLUMNS
        );
        Ok(conn.query_row(&sql, [], map_batch_row).optional()?)
    }

    /// Most recent batches first
    pub fn list_recent(&self, limit: u32) -> RepositoryResult<Vec<RecyclingBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM recycling_batch ORDER BY batch_number DESC LIMIT ?1",
            BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], map_batch_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM recycling_batch", [], |row| row.get(0))?)
    }

    pub fn count_in_progress(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM recycling_batch WHERE status = 'IN_PROGRESS'",
            [],
            |row| row.get(0),
        )?)
    }

    /// Next sequential batch number (1-based)
    pub fn next_batch_number(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COALESCE(MAX(batch_number), 0) + 1 FROM recycling_batch",
            [],
            |row| row.get(0),
        )?)
    }

    // ==========================================
    // Writes
    // ==========================================

    /// Insert an IN_PROGRESS batch and claim exactly the given scrap records
    ///
    /// Every id must still be PENDING/CONFIRMED and unclaimed; otherwise the
    /// transaction is rolled back with `ConcurrentModification`.
    pub fn insert_with_claims(
        &self,
        batch: &RecyclingBatch,
        scrap_ids: &[String],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;

        tx.execute(
            r#"
            INSERT INTO recycling_batch (
                batch_id, batch_number, status,
                total_hard_scrap, total_soft_scrap, final_vt_quantity,
                started_by, started_at, completed_by, completed_at, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                batch.batch_id,
                batch.batch_number,
                batch.status.to_db_str(),
                batch.total_hard_scrap,
                batch.total_soft_scrap,
                batch.final_vt_quantity,
                batch.started_by,
                fmt_ts(&batch.started_at),
                batch.completed_by,
                batch.completed_at.as_ref().map(fmt_ts),
                batch.notes,
            ],
        )?;

        let claimed = {
            let mut stmt = tx.prepare(
                r#"
                UPDATE scrap_record
                SET status = 'CLAIMED', claimed_batch_id = ?2, updated_at = ?3
                WHERE scrap_id = ?1
                  AND status IN ('PENDING', 'CONFIRMED')
                  AND claimed_batch_id IS NULL
                "#,
            )?;
            let now = fmt_ts(&batch.started_at);
            let mut claimed = 0usize;
            for scrap_id in scrap_ids {
                claimed += stmt.execute(params![scrap_id, batch.batch_id, now])?;
            }
            claimed
        };

        if claimed != scrap_ids.len() {
            return Err(RepositoryError::ConcurrentModification {
                message: format!(
                    "expected to claim {} scrap records, claimed {}",
                    scrap_ids.len(),
                    claimed
                ),
            });
        }

        tx.commit()?;
        Ok(())
    }

    /// Close an IN_PROGRESS batch, recycle its claimed scrap and write the audit rows
    ///
    /// `recyclings` must cover exactly the batch's CLAIMED records.
    pub fn complete_with_recyclings(
        &self,
        completion: &BatchCompletion<'_>,
        recyclings: &[Recycling],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let completed_at = fmt_ts(&completion.completed_at);

        let closed = tx.execute(
            r#"
            UPDATE recycling_batch
            SET status = 'COMPLETED',
                final_vt_quantity = ?2,
                completed_by = ?3,
                completed_at = ?4,
                notes = COALESCE(?5, notes)
            WHERE batch_id = ?1 AND status = 'IN_PROGRESS'
            "#,
            params![
                completion.batch_id,
                completion.final_vt_quantity,
                completion.completed_by,
                completed_at,
                completion.notes,
            ],
        )?;
        if closed != 1 {
            return Err(RepositoryError::ConcurrentModification {
                message: format!("batch {} is no longer IN_PROGRESS", completion.batch_id),
            });
        }

        let recycled = tx.execute(
            r#"
            UPDATE scrap_record
            SET status = 'RECYCLED', updated_at = ?2
            WHERE claimed_batch_id = ?1 AND status = 'CLAIMED'
            "#,
            params![completion.batch_id, completed_at],
        )?;
        if recycled != recyclings.len() {
            return Err(RepositoryError::ConcurrentModification {
                message: format!(
                    "batch {} has {} claimed records, {} recycling rows supplied",
                    completion.batch_id,
                    recycled,
                    recyclings.len()
                ),
            });
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO recycling (
                    recycling_id, scrap_id, batch_id, recycled_quantity,
                    recycled_by, recycled_at, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for r in recyclings {
                stmt.execute(params![
                    r.recycling_id,
                    r.scrap_id,
                    r.batch_id,
                    r.recycled_quantity,
                    r.recycled_by,
                    fmt_ts(&r.recycled_at),
                    r.notes,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

// ==========================================
// Row mapping
// ==========================================

fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<RecyclingBatch> {
    Ok(RecyclingBatch {
        batch_id: row.get(0)?,
        batch_number: row.get(1)?,
        status: parse_enum(2, &row.get::<_, String>(2)?, BatchStatus::from_str)?,
        total_hard_scrap: row.get(3)?,
        total_soft_scrap: row.get(4)?,
        final_vt_quantity: row.get(5)?,
        started_by: row.get(6)?,
        started_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        completed_by: row.get(8)?,
        completed_at: parse_opt_ts(9, row.get(9)?)?,
        notes: row.get(10)?,
    })
}
