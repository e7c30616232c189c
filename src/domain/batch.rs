// ==========================================
// Scrap Recycling - Recycling Batch Model
// ==========================================
// NONE -> IN_PROGRESS -> COMPLETED (terminal)
// At most one batch may be IN_PROGRESS at a time.
// ==========================================

use crate::domain::scrap::ScrapTotals;
use crate::domain::types::BatchStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RecyclingBatch
// ==========================================
// Aligned with the recycling_batch table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecyclingBatch {
    pub batch_id: String,
    pub batch_number: i64, // sequential, unique
    pub status: BatchStatus,

    // ===== ledger snapshot at start =====
    pub total_hard_scrap: f64,
    pub total_soft_scrap: f64,

    // ===== completion =====
    pub final_vt_quantity: Option<f64>, // null until COMPLETED

    pub started_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl RecyclingBatch {
    /// New IN_PROGRESS batch carrying the ledger snapshot
    pub fn start(batch_number: i64, totals: ScrapTotals, started_by: String) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            batch_number,
            status: BatchStatus::InProgress,
            total_hard_scrap: totals.hard_total,
            total_soft_scrap: totals.soft_total,
            final_vt_quantity: None,
            started_by,
            started_at: Utc::now(),
            completed_by: None,
            completed_at: None,
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BatchStatus::InProgress
    }

    /// Total scrap folded into the batch at start
    pub fn total_input(&self) -> f64 {
        self.total_hard_scrap + self.total_soft_scrap
    }

    /// Display label, e.g. "RB-000042"
    pub fn label(&self) -> String {
        format!("RB-{:06}", self.batch_number)
    }
}
