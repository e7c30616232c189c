// ==========================================
// Scrap Recycling - Recycling Batch Manager
// ==========================================
// Lifecycle: (none) --StartBatch--> IN_PROGRESS --CompleteBatch--> COMPLETED
// Rule: at most one IN_PROGRESS batch at any instant
// Rule: totals are captured once at start and never recomputed
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::batch::RecyclingBatch;
use crate::domain::recycling::Recycling;
use crate::domain::types::ScrapStatus;
use crate::engine::completion_gate::CompletionGate;
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent, WorkflowEventType};
use crate::engine::ledger::{require_actor, ScrapLedger};
use crate::engine::lock::WorkflowLock;
use crate::engine::repositories::{record_action, WorkflowRepositories};
use crate::repository::batch_repo::BatchCompletion;
use crate::repository::error::RepositoryError;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct RecyclingBatchManager {
    repos: WorkflowRepositories,
    ledger: Arc<ScrapLedger>,
    lock: WorkflowLock,
    publisher: OptionalEventPublisher,
}

impl RecyclingBatchManager {
    pub fn new(
        repos: WorkflowRepositories,
        ledger: Arc<ScrapLedger>,
        lock: WorkflowLock,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            repos,
            ledger,
            lock,
            publisher,
        }
    }

    // ==========================================
    // Queries
    // ==========================================

    pub fn get_active_batch(&self) -> WorkflowResult<Option<RecyclingBatch>> {
        Ok(self.repos.batch_repo.find_active()?)
    }

    pub fn get_batch(&self, batch_id: &str) -> WorkflowResult<RecyclingBatch> {
        self.repos
            .batch_repo
            .find_by_id(batch_id)?
            .ok_or_else(|| WorkflowError::not_found("RecyclingBatch", batch_id))
    }

    /// Newest first
    pub fn list_batches(&self, limit: u32) -> WorkflowResult<Vec<RecyclingBatch>> {
        Ok(self.repos.batch_repo.list_recent(limit)?)
    }

    pub fn list_recyclings(&self, batch_id: &str) -> WorkflowResult<Vec<Recycling>> {
        self.get_batch(batch_id)?;
        Ok(self.repos.recycling_repo.find_by_batch(batch_id)?)
    }

    // ==========================================
    // StartBatch
    // ==========================================

    /// Open a new batch over every uncollected scrap record
    ///
    /// # Errors
    /// - `Conflict`: another batch is IN_PROGRESS
    /// - `InvalidState`: both uncollected totals are zero
    #[instrument(skip(self))]
    pub fn start_batch(&self, initiator: &str) -> WorkflowResult<RecyclingBatch> {
        require_actor(initiator)?;
        let _guard = self.lock.acquire()?;

        if let Some(active) = self.repos.batch_repo.find_active()? {
            return Err(WorkflowError::Conflict(format!(
                "batch {} is already in progress",
                active.label()
            )));
        }

        let (records, totals) = self.ledger.uncollected_snapshot()?;
        if totals.is_empty() {
            return Err(WorkflowError::InvalidState(
                "nothing to process: no uncollected scrap".to_string(),
            ));
        }

        let batch_number = self.repos.batch_repo.next_batch_number()?;
        let batch = RecyclingBatch::start(batch_number, totals, initiator.trim().to_string());
        let scrap_ids: Vec<String> = records.iter().map(|r| r.scrap_id.clone()).collect();

        match self.repos.batch_repo.insert_with_claims(&batch, &scrap_ids) {
            Ok(()) => {}
            Err(e) if e.is_active_batch_violation() || e.is_batch_number_violation() => {
                return Err(WorkflowError::Conflict(
                    "another batch was started concurrently".to_string(),
                ));
            }
            Err(RepositoryError::ConcurrentModification { message }) => {
                return Err(WorkflowError::Conflict(message));
            }
            Err(e) => return Err(e.into()),
        }

        let stored = self.get_batch(&batch.batch_id)?;

        self.log_action(
            ActionLog::new(ActionType::StartBatch, initiator.trim())
                .with_batch(&stored.batch_id)
                .with_payload(json!({
                    "batch_number": stored.batch_number,
                    "total_hard_scrap": stored.total_hard_scrap,
                    "total_soft_scrap": stored.total_soft_scrap,
                    "claimed_records": scrap_ids.len(),
                }))
                .with_detail(format!("started batch {}", stored.label())),
        );
        self.publisher.publish_committed(WorkflowEvent::for_batch(
            WorkflowEventType::BatchStarted,
            &stored,
        ));

        info!(
            batch_id = %stored.batch_id,
            batch_number = stored.batch_number,
            hard = stored.total_hard_scrap,
            soft = stored.total_soft_scrap,
            "recycling batch started"
        );
        Ok(stored)
    }

    // ==========================================
    // CompleteBatch
    // ==========================================

    /// Finalize an IN_PROGRESS batch
    ///
    /// Gate is re-evaluated against the stored processes; the caller's own
    /// view is never trusted.
    ///
    /// # Errors
    /// - `NotFound`: unknown batch
    /// - `InvalidState`: batch already COMPLETED
    /// - `PreconditionFailed`: a line has no completed run
    /// - `InvalidInput`: negative or non-finite output quantity
    #[instrument(skip(self, notes))]
    pub fn complete_batch(
        &self,
        batch_id: &str,
        final_output_quantity: f64,
        notes: Option<String>,
        actor: &str,
    ) -> WorkflowResult<RecyclingBatch> {
        if !final_output_quantity.is_finite() || final_output_quantity < 0.0 {
            return Err(WorkflowError::InvalidInput(format!(
                "final output quantity must be a non-negative number, got {}",
                final_output_quantity
            )));
        }
        require_actor(actor)?;
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let _guard = self.lock.acquire()?;

        let batch = self.get_batch(batch_id)?;
        if !batch.is_active() {
            return Err(WorkflowError::InvalidState(format!(
                "batch {} is already completed",
                batch.label()
            )));
        }

        let processes = self.repos.drobilka_repo.find_by_batch(batch_id)?;
        let verdict = CompletionGate::evaluate(&batch, &processes);
        if !verdict.is_ready() {
            return Err(WorkflowError::PreconditionFailed {
                batch_id: batch.batch_id.clone(),
                batch_label: batch.label(),
                missing: verdict.missing,
            });
        }

        let actor = actor.trim();
        let completed_at = Utc::now();
        let recyclings: Vec<Recycling> = self
            .repos
            .scrap_repo
            .find_by_batch(batch_id)?
            .iter()
            .filter(|r| r.status == ScrapStatus::Claimed)
            .map(|r| Recycling::for_record(r, batch_id, actor, completed_at, notes.clone()))
            .collect();

        self.repos.batch_repo.complete_with_recyclings(
            &BatchCompletion {
                batch_id,
                final_vt_quantity: final_output_quantity,
                notes: notes.as_deref(),
                completed_by: actor,
                completed_at,
            },
            &recyclings,
        )?;

        let stored = self.get_batch(batch_id)?;

        self.log_action(
            ActionLog::new(ActionType::CompleteBatch, actor)
                .with_batch(batch_id)
                .with_payload(json!({
                    "final_vt_quantity": final_output_quantity,
                    "recycled_records": recyclings.len(),
                    "hard_runs_completed": verdict.hard_completed,
                    "soft_runs_completed": verdict.soft_completed,
                }))
                .with_detail(format!("completed batch {}", stored.label())),
        );
        self.publisher.publish_committed(WorkflowEvent::for_batch(
            WorkflowEventType::BatchCompleted,
            &stored,
        ));

        info!(
            batch_id,
            final_vt_quantity = final_output_quantity,
            recycled = recyclings.len(),
            "recycling batch completed"
        );
        Ok(stored)
    }

    fn log_action(&self, log: ActionLog) {
        record_action(&self.repos.action_log_repo, log);
    }
}
