// ==========================================
// Scrap Recycling - Recycling Audit Model
// ==========================================
// One row per scrap record consumed by a batch completion.
// Immutable once written.
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::scrap::ScrapRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recycling {
    pub recycling_id: String,
    pub scrap_id: String,
    pub batch_id: String,
    pub recycled_quantity: f64,
    pub recycled_by: String,
    pub recycled_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Recycling {
    /// Audit row for a scrap record consumed by `batch_id`
    pub fn for_record(
        record: &ScrapRecord,
        batch_id: &str,
        recycled_by: &str,
        recycled_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            recycling_id: uuid::Uuid::new_v4().to_string(),
            scrap_id: record.scrap_id.clone(),
            batch_id: batch_id.to_string(),
            recycled_quantity: record.quantity,
            recycled_by: recycled_by.to_string(),
            recycled_at,
            notes,
        }
    }
}
