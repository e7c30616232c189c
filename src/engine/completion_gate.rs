// ==========================================
// Scrap Recycling - Completion Gate
// ==========================================
// Pure decision: a batch may be finalized once both the hard and the soft
// line have at least one completed run owned by that batch.
// Never cached; callers re-evaluate on every refresh.
// ==========================================

use crate::domain::batch::RecyclingBatch;
use crate::domain::drobilka::DrobilkaProcess;
use crate::domain::types::DrobilkaType;
use serde::{Deserialize, Serialize};

/// Per-line breakdown behind a gate decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub hard_completed: usize,
    pub soft_completed: usize,
    pub hard_active: usize,
    pub soft_active: usize,
    /// Lines with no completed run yet (empty = ready)
    pub missing: Vec<DrobilkaType>,
}

impl GateVerdict {
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }
}

pub struct CompletionGate;

impl CompletionGate {
    /// True iff the batch owns >=1 completed HARD run and >=1 completed SOFT run
    ///
    /// Runs owned by other batches are ignored. Active sibling runs do not
    /// block completion.
    pub fn can_complete(batch: &RecyclingBatch, processes: &[DrobilkaProcess]) -> bool {
        Self::evaluate(batch, processes).is_ready()
    }

    pub fn evaluate(batch: &RecyclingBatch, processes: &[DrobilkaProcess]) -> GateVerdict {
        let mut verdict = GateVerdict::default();

        for p in processes.iter().filter(|p| p.batch_id == batch.batch_id) {
            match (p.drobilka_type, p.is_completed()) {
                (DrobilkaType::Hard, true) => verdict.hard_completed += 1,
                (DrobilkaType::Hard, false) => verdict.hard_active += 1,
                (DrobilkaType::Soft, true) => verdict.soft_completed += 1,
                (DrobilkaType::Soft, false) => verdict.soft_active += 1,
            }
        }

        if verdict.hard_completed == 0 {
            verdict.missing.push(DrobilkaType::Hard);
        }
        if verdict.soft_completed == 0 {
            verdict.missing.push(DrobilkaType::Soft);
        }
        verdict
    }
}
