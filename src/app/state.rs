// ==========================================
// Scrap Recycling - Application State
// ==========================================
// Wires one shared connection into repositories, engine and API.
// Every service built here shares the same WorkflowLock.
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::api::RecyclingApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{
    BroadcastEventPublisher, DrobilkaProcessTracker, OptionalEventPublisher,
    RecyclingBatchManager, ScrapLedger, WorkflowEvent, WorkflowLock, WorkflowRepositories,
};
use crate::poller::{LocalWorkflowSource, WorkflowSource};

/// Capacity of the in-process change notification channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct AppState {
    pub db_path: String,

    pub recycling_api: Arc<RecyclingApi>,

    pub config_manager: Arc<ConfigManager>,

    /// Committed-change notifications (poller push acceleration)
    pub event_publisher: Arc<BroadcastEventPublisher>,
}

impl AppState {
    /// Open (or create) the database at `db_path` and build all services
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("initializing AppState, database path: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("cannot open database: {}", e))?;
        Self::with_connection(conn, db_path)
    }

    /// Build on an already opened connection (tests use a temp file)
    pub fn with_connection(conn: Connection, db_path: String) -> Result<Self, String> {
        ensure_schema(&conn).map_err(|e| format!("schema initialization failed: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("cannot create ConfigManager: {}", e))?,
        );
        let default_unit = config_manager
            .get_default_scrap_unit()
            .map_err(|e| format!("cannot read default scrap unit: {}", e))?;

        let repos = WorkflowRepositories::from_connection(conn);
        let lock = WorkflowLock::new();
        let event_publisher = Arc::new(BroadcastEventPublisher::new(EVENT_CHANNEL_CAPACITY));
        let publisher = OptionalEventPublisher::with_publisher(event_publisher.clone());

        let ledger = Arc::new(ScrapLedger::new(
            repos.scrap_repo.clone(),
            repos.action_log_repo.clone(),
            lock.clone(),
            publisher.clone(),
        ));
        let batch_manager = Arc::new(RecyclingBatchManager::new(
            repos.clone(),
            ledger.clone(),
            lock.clone(),
            publisher.clone(),
        ));
        let tracker = Arc::new(DrobilkaProcessTracker::new(
            repos.clone(),
            lock,
            publisher,
        ));

        let recycling_api = Arc::new(RecyclingApi::new(
            ledger,
            batch_manager,
            tracker,
            repos.action_log_repo,
            default_unit,
        ));

        tracing::info!("AppState initialized");
        Ok(Self {
            db_path,
            recycling_api,
            config_manager,
            event_publisher,
        })
    }

    /// Poller source reading this database
    pub fn local_source(&self) -> Arc<dyn WorkflowSource> {
        Arc::new(LocalWorkflowSource::new(self.recycling_api.clone()))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_publisher.subscribe()
    }
}

/// Database path
///
/// `SCRAP_RECYCLING_DB_PATH` wins when set; otherwise the per-user data
/// directory, falling back to the working directory.
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SCRAP_RECYCLING_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./scrap_recycling.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("scrap-recycling");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("cannot create data directory {}: {}", dir.display(), e);
        } else {
            path = dir.join("scrap_recycling.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_with_connection_builds_empty_workflow() {
        let conn = Connection::open_in_memory().unwrap();
        let state = AppState::with_connection(conn, ":memory:".to_string()).unwrap();

        let snapshot = state.recycling_api.get_workflow_snapshot().unwrap();
        assert!(snapshot.active_batch.is_none());
        assert!(snapshot.totals.is_empty());
    }
}
