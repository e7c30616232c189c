use super::core::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::RepositoryResult;
use crate::repository::row_utils::{parse_enum, parse_ts};
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const ACTION_LOG_COLUMNS: &str = r#"
    action_id, action_type, action_ts, actor,
    batch_id, process_id, scrap_id,
    payload_json, detail
"#;

impl ActionLogRepository {
    // ==========================================
    // Queries
    // ==========================================

    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?1", ACTION_LOG_COLUMNS);
        Ok(conn.query_row(&sql, params![action_id], map_row).optional()?)
    }

    /// Most recent first
    pub fn find_recent(&self, limit: u32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC LIMIT ?1",
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// All entries of one batch, oldest first
    pub fn find_by_batch_id(&self, batch_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE batch_id = ?1 ORDER BY action_ts ASC",
            ACTION_LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![batch_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn count_by_type(&self, action_type: ActionType) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?1",
            params![action_type.to_db_str()],
            |row| row.get(0),
        )?)
    }
}

fn map_row(row: &Row<'_>) -> SqliteResult<ActionLog> {
    let payload_json: Option<String> = row.get(7)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        action_type: parse_enum(1, &row.get::<_, String>(1)?, ActionType::from_str)?,
        action_ts: parse_ts(2, &row.get::<_, String>(2)?)?,
        actor: row.get(3)?,
        batch_id: row.get(4)?,
        process_id: row.get(5)?,
        scrap_id: row.get(6)?,
        // payload is informational; a corrupt blob must not hide the row
        payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(8)?,
    })
}
