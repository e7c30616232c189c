// ==========================================
// Scrap Recycling - Drobilka Process Model
// ==========================================
// One grinding run on the hard or soft line, owned by exactly one batch.
// completed_at is set once and never cleared; non-null = terminal.
// ==========================================

use crate::domain::types::DrobilkaType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// DrobilkaProcess
// ==========================================
// Aligned with the drobilka_process table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrobilkaProcess {
    pub process_id: String,
    pub batch_id: String,
    pub drobilka_type: DrobilkaType,
    pub input_quantity: f64,
    pub work_center: String,
    pub lead_operator: String,
    pub operators: Vec<String>, // participants, lead included
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>, // null = active
    pub output_quantity: Option<f64>,
}

impl DrobilkaProcess {
    /// New active run
    ///
    /// The lead operator is always part of the participant set; duplicates
    /// and blank names are dropped while keeping first-seen order.
    pub fn start(
        batch_id: String,
        drobilka_type: DrobilkaType,
        input_quantity: f64,
        work_center: String,
        lead_operator: String,
        operators: Vec<String>,
    ) -> Self {
        let mut participants: Vec<String> = Vec::with_capacity(operators.len() + 1);
        for name in std::iter::once(lead_operator.clone()).chain(operators) {
            let name = name.trim().to_string();
            if !name.is_empty() && !participants.contains(&name) {
                participants.push(name);
            }
        }

        Self {
            process_id: uuid::Uuid::new_v4().to_string(),
            batch_id,
            drobilka_type,
            input_quantity,
            work_center,
            lead_operator,
            operators: participants,
            started_at: Utc::now(),
            completed_at: None,
            output_quantity: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.completed_at.is_none()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
