// ==========================================
// Scrap Recycling - Operator Action Log
// ==========================================
// Every successful workflow command writes one row.
// Aligned with the action_log table
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub action_type: ActionType,
    pub action_ts: DateTime<Utc>,
    pub actor: String,

    // ===== scope =====
    pub batch_id: Option<String>,
    pub process_id: Option<String>,
    pub scrap_id: Option<String>,

    pub payload_json: Option<JsonValue>, // command arguments
    pub detail: Option<String>,          // one-line description
}

impl ActionLog {
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type,
            action_ts: Utc::now(),
            actor: actor.to_string(),
            batch_id: None,
            process_id: None,
            scrap_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_batch(mut self, batch_id: &str) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self
    }

    pub fn with_process(mut self, process_id: &str) -> Self {
        self.process_id = Some(process_id.to_string());
        self
    }

    pub fn with_scrap(mut self, scrap_id: &str) -> Self {
        self.scrap_id = Some(scrap_id.to_string());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    ReportScrap,
    ConfirmScrap,
    WriteOffScrap,
    StartBatch,
    CompleteBatch,
    StartDrobilka,
    CompleteDrobilka,
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::ReportScrap => "REPORT_SCRAP",
            ActionType::ConfirmScrap => "CONFIRM_SCRAP",
            ActionType::WriteOffScrap => "WRITE_OFF_SCRAP",
            ActionType::StartBatch => "START_BATCH",
            ActionType::CompleteBatch => "COMPLETE_BATCH",
            ActionType::StartDrobilka => "START_DROBILKA",
            ActionType::CompleteDrobilka => "COMPLETE_DROBILKA",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "REPORT_SCRAP" => Some(ActionType::ReportScrap),
            "CONFIRM_SCRAP" => Some(ActionType::ConfirmScrap),
            "WRITE_OFF_SCRAP" => Some(ActionType::WriteOffScrap),
            "START_BATCH" => Some(ActionType::StartBatch),
            "COMPLETE_BATCH" => Some(ActionType::CompleteBatch),
            "START_DROBILKA" => Some(ActionType::StartDrobilka),
            "COMPLETE_DROBILKA" => Some(ActionType::CompleteDrobilka),
            _ => None,
        }
    }
}
