// ==========================================
// Scrap Recycling - Recycling Audit Repository
// ==========================================
// Read side only: rows are written by the batch completion transaction
// ==========================================

use crate::domain::recycling::Recycling;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::parse_ts;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const RECYCLING_COLUMNS: &str = r#"
    recycling_id, scrap_id, batch_id, recycled_quantity,
    recycled_by, recycled_at, notes
"#;

pub struct RecyclingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RecyclingRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<Recycling>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM recycling WHERE batch_id = ?1 ORDER BY recycled_at ASC, scrap_id ASC",
            RECYCLING_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![batch_id], map_recycling_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn find_by_scrap(&self, scrap_id: &str) -> RepositoryResult<Vec<Recycling>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM recycling WHERE scrap_id = ?1 ORDER BY recycled_at ASC",
            RECYCLING_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![scrap_id], map_recycling_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn map_recycling_row(row: &Row<'_>) -> rusqlite::Result<Recycling> {
    Ok(Recycling {
        recycling_id: row.get(0)?,
        scrap_id: row.get(1)?,
        batch_id: row.get(2)?,
        recycled_quantity: row.get(3)?,
        recycled_by: row.get(4)?,
        recycled_at: parse_ts(5, &row.get::<_, String>(5)?)?,
        notes: row.get(6)?,
    })
}
