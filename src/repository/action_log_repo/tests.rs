use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(ActionType::StartBatch, "shift_lead")
        .with_batch("B1")
        .with_payload(serde_json::json!({ "batch_number": 1 }))
        .with_detail("started RB-000001");
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action_type, ActionType::StartBatch);
    assert_eq!(found.actor, "shift_lead");
    assert_eq!(found.batch_id.as_deref(), Some("B1"));
    assert_eq!(found.payload_json.unwrap()["batch_number"], 1);
}

#[test]
fn test_find_by_batch_and_count() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new(ActionType::StartBatch, "a").with_batch("B1")).unwrap();
    repo.insert(&ActionLog::new(ActionType::StartDrobilka, "b").with_batch("B1")).unwrap();
    repo.insert(&ActionLog::new(ActionType::StartBatch, "c").with_batch("B2")).unwrap();

    assert_eq!(repo.find_by_batch_id("B1").unwrap().len(), 2);
    assert_eq!(repo.count_by_type(ActionType::StartBatch).unwrap(), 2);
    assert_eq!(repo.find_recent(2).unwrap().len(), 2);
    assert!(repo.find_by_id("missing").unwrap().is_none());
}
