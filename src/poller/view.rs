// ==========================================
// Scrap Recycling - Workflow View
// ==========================================
// What observers see. Replaced wholesale on every tick; a failed tick
// keeps the last good snapshot and only records the error.
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::recycling_api::WorkflowSnapshot;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowView {
    /// Last successfully fetched state (None until the first success)
    pub snapshot: Option<WorkflowSnapshot>,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Successful refreshes since start
    pub refresh_count: u64,
    pub auto_refresh: bool,
}

impl WorkflowView {
    pub fn initial(auto_refresh: bool) -> Self {
        Self {
            auto_refresh,
            ..Self::default()
        }
    }

    pub(crate) fn with_snapshot(&self, snapshot: WorkflowSnapshot) -> Self {
        Self {
            last_success_at: Some(snapshot.captured_at),
            snapshot: Some(snapshot),
            last_error: None,
            consecutive_errors: 0,
            refresh_count: self.refresh_count + 1,
            auto_refresh: self.auto_refresh,
        }
    }

    pub(crate) fn with_error(&self, error: String) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            last_error: Some(error),
            consecutive_errors: self.consecutive_errors.saturating_add(1),
            last_success_at: self.last_success_at,
            refresh_count: self.refresh_count,
            auto_refresh: self.auto_refresh,
        }
    }

    /// Gate verdict of the last good snapshot
    pub fn can_complete(&self) -> bool {
        self.snapshot.as_ref().map(|s| s.can_complete).unwrap_or(false)
    }

    /// True when the last refresh failed and the data shown may be old
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}
