// ==========================================
// Scrap Recycling - Engine Repository Bundle
// ==========================================
// Groups every repository the workflow engine needs behind one value
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::warn;

use crate::domain::action_log::ActionLog;
use crate::repository::{
    ActionLogRepository, DrobilkaProcessRepository, RecyclingBatchRepository,
    RecyclingRepository, ScrapRecordRepository,
};

/// Workflow repository set
///
/// All members share the same connection.
#[derive(Clone)]
pub struct WorkflowRepositories {
    pub scrap_repo: Arc<ScrapRecordRepository>,
    pub batch_repo: Arc<RecyclingBatchRepository>,
    pub drobilka_repo: Arc<DrobilkaProcessRepository>,
    pub recycling_repo: Arc<RecyclingRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl WorkflowRepositories {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            scrap_repo: Arc::new(ScrapRecordRepository::new(conn.clone())),
            batch_repo: Arc::new(RecyclingBatchRepository::new(conn.clone())),
            drobilka_repo: Arc::new(DrobilkaProcessRepository::new(conn.clone())),
            recycling_repo: Arc::new(RecyclingRepository::new(conn.clone())),
            action_log_repo: Arc::new(ActionLogRepository::new(conn)),
        }
    }
}

/// Append an audit entry
///
/// The workflow change is already committed when this runs, so a failed
/// audit write is logged and swallowed.
pub(crate) fn record_action(repo: &ActionLogRepository, log: ActionLog) {
    if let Err(e) = repo.insert(&log) {
        warn!(
            action_type = log.action_type.to_db_str(),
            error = %e,
            "failed to write action log"
        );
    }
}
