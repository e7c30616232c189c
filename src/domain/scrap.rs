// ==========================================
// Scrap Recycling - Scrap Record Model
// ==========================================
// Lifecycle: created on scrap report, only ever status-transitioned.
// A RECYCLED record is immutable.
// ==========================================

use crate::domain::types::{ScrapClass, ScrapStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ScrapRecord
// ==========================================
// Aligned with the scrap_record table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapRecord {
    pub scrap_id: String,
    pub scrap_class: ScrapClass,
    pub quantity: f64,
    pub unit: String,
    pub status: ScrapStatus,
    pub reporter: String,
    pub reason_code: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,

    // ===== batch claim =====
    pub claimed_batch_id: Option<String>, // set while CLAIMED / after RECYCLED
    pub updated_at: DateTime<Utc>,
}

impl ScrapRecord {
    /// New PENDING record
    pub fn new(
        scrap_class: ScrapClass,
        quantity: f64,
        unit: String,
        reporter: String,
        reason_code: Option<String>,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            scrap_id: uuid::Uuid::new_v4().to_string(),
            scrap_class,
            quantity,
            unit,
            status: ScrapStatus::Pending,
            reporter,
            reason_code,
            notes,
            created_at: now,
            claimed_batch_id: None,
            updated_at: now,
        }
    }

    pub fn is_uncollected(&self) -> bool {
        self.status.is_uncollected()
    }
}

// ==========================================
// ScrapTotals - uncollected quantity per class
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapTotals {
    pub hard_total: f64,
    pub soft_total: f64,
}

impl ScrapTotals {
    /// Sum the uncollected records of a slice, grouped by class
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ScrapRecord>,
    {
        records
            .into_iter()
            .filter(|r| r.is_uncollected())
            .fold(ScrapTotals::default(), |mut acc, r| {
                match r.scrap_class {
                    ScrapClass::Hard => acc.hard_total += r.quantity,
                    ScrapClass::Soft => acc.soft_total += r.quantity,
                }
                acc
            })
    }

    pub fn grand_total(&self) -> f64 {
        self.hard_total + self.soft_total
    }

    pub fn is_empty(&self) -> bool {
        self.grand_total() <= 0.0
    }
}
