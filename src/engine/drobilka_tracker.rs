// ==========================================
// Scrap Recycling - Drobilka Process Tracker
// ==========================================
// Lifecycle: (none) --StartProcess--> active --CompleteProcess--> completed
// A run always belongs to exactly one batch. Several runs of the same line
// may coexist within a batch; this tracker does not limit them.
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::drobilka::DrobilkaProcess;
use crate::domain::types::DrobilkaType;
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent, WorkflowEventType};
use crate::engine::lock::WorkflowLock;
use crate::engine::repositories::{record_action, WorkflowRepositories};
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};

/// StartProcess input
#[derive(Debug, Clone)]
pub struct ProcessStart {
    pub batch_id: String,
    pub drobilka_type: DrobilkaType,
    pub input_quantity: f64,
    pub work_center: String,
    pub lead_operator: String,
    pub operators: Vec<String>,
}

pub struct DrobilkaProcessTracker {
    repos: WorkflowRepositories,
    lock: WorkflowLock,
    publisher: OptionalEventPublisher,
}

impl DrobilkaProcessTracker {
    pub fn new(
        repos: WorkflowRepositories,
        lock: WorkflowLock,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            repos,
            lock,
            publisher,
        }
    }

    pub fn get_process(&self, process_id: &str) -> WorkflowResult<DrobilkaProcess> {
        self.repos
            .drobilka_repo
            .find_by_id(process_id)?
            .ok_or_else(|| WorkflowError::not_found("DrobilkaProcess", process_id))
    }

    /// Runs of one batch (oldest first), or every run (newest first)
    pub fn list_processes(&self, batch_id: Option<&str>) -> WorkflowResult<Vec<DrobilkaProcess>> {
        match batch_id {
            Some(id) => Ok(self.repos.drobilka_repo.find_by_batch(id)?),
            None => Ok(self.repos.drobilka_repo.list_all()?),
        }
    }

    /// Open a run on the given line for an IN_PROGRESS batch
    #[instrument(skip(self, start), fields(batch_id = %start.batch_id, line = %start.drobilka_type))]
    pub fn start_process(&self, start: ProcessStart) -> WorkflowResult<DrobilkaProcess> {
        if !start.input_quantity.is_finite() || start.input_quantity <= 0.0 {
            return Err(WorkflowError::InvalidInput(format!(
                "input quantity must be a positive number, got {}",
                start.input_quantity
            )));
        }
        if start.work_center.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "work center must not be blank".to_string(),
            ));
        }
        if start.lead_operator.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "lead operator must not be blank".to_string(),
            ));
        }

        let _guard = self.lock.acquire()?;

        let batch = self
            .repos
            .batch_repo
            .find_by_id(&start.batch_id)?
            .ok_or_else(|| WorkflowError::not_found("RecyclingBatch", &start.batch_id))?;
        if !batch.is_active() {
            return Err(WorkflowError::InvalidState(format!(
                "batch {} is completed; no new drobilka runs may start",
                batch.label()
            )));
        }

        let process = DrobilkaProcess::start(
            batch.batch_id.clone(),
            start.drobilka_type,
            start.input_quantity,
            start.work_center.trim().to_string(),
            start.lead_operator.trim().to_string(),
            start.operators,
        );
        self.repos.drobilka_repo.insert(&process)?;
        let stored = self.get_process(&process.process_id)?;

        self.log_action(
            ActionLog::new(ActionType::StartDrobilka, &stored.lead_operator)
                .with_batch(&stored.batch_id)
                .with_process(&stored.process_id)
                .with_payload(json!({
                    "drobilka_type": stored.drobilka_type.to_db_str(),
                    "input_quantity": stored.input_quantity,
                    "work_center": stored.work_center,
                    "operators": stored.operators,
                }))
                .with_detail(format!(
                    "started {} run for batch {}",
                    stored.drobilka_type.line_name(),
                    batch.label()
                )),
        );
        self.publisher.publish_committed(WorkflowEvent::for_process(
            WorkflowEventType::ProcessStarted,
            &stored,
        ));

        info!(process_id = %stored.process_id, "drobilka run started");
        Ok(stored)
    }

    /// Close an active run
    ///
    /// Allowed even after the owning batch completed, so a run left open
    /// can still be recorded.
    #[instrument(skip(self))]
    pub fn complete_process(
        &self,
        process_id: &str,
        output_quantity: f64,
    ) -> WorkflowResult<DrobilkaProcess> {
        if !output_quantity.is_finite() || output_quantity < 0.0 {
            return Err(WorkflowError::InvalidInput(format!(
                "output quantity must be a non-negative number, got {}",
                output_quantity
            )));
        }

        let _guard = self.lock.acquire()?;

        let process = self.get_process(process_id)?;
        if let Some(completed_at) = process.completed_at {
            return Err(WorkflowError::InvalidState(format!(
                "drobilka run {} already completed at {}",
                process_id,
                completed_at.to_rfc3339()
            )));
        }

        let rows = self
            .repos
            .drobilka_repo
            .mark_completed(process_id, output_quantity, Utc::now())?;
        if rows == 0 {
            return Err(WorkflowError::InvalidState(format!(
                "drobilka run {} was completed concurrently",
                process_id
            )));
        }
        let stored = self.get_process(process_id)?;

        self.log_action(
            ActionLog::new(ActionType::CompleteDrobilka, &stored.lead_operator)
                .with_batch(&stored.batch_id)
                .with_process(process_id)
                .with_payload(json!({
                    "drobilka_type": stored.drobilka_type.to_db_str(),
                    "output_quantity": output_quantity,
                }))
                .with_detail(format!(
                    "completed {} run",
                    stored.drobilka_type.line_name()
                )),
        );
        self.publisher.publish_committed(WorkflowEvent::for_process(
            WorkflowEventType::ProcessCompleted,
            &stored,
        ));

        info!(process_id, output_quantity, "drobilka run completed");
        Ok(stored)
    }

    fn log_action(&self, log: ActionLog) {
        record_action(&self.repos.action_log_repo, log);
    }
}
