// ==========================================
// Scrap Recycling - Recycling Workflow API
// ==========================================
// Boundary for consoles, the poller and the CLI.
// Queries read the system of record; commands go through the engine.
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::batch::RecyclingBatch;
use crate::domain::drobilka::DrobilkaProcess;
use crate::domain::recycling::Recycling;
use crate::domain::scrap::{ScrapRecord, ScrapTotals};
use crate::domain::types::{DrobilkaType, ScrapClass, ScrapStatus};
use crate::engine::{
    CompletionGate, DrobilkaProcessTracker, GateVerdict, ProcessStart, RecyclingBatchManager,
    ScrapLedger, ScrapReport,
};
use crate::repository::action_log_repo::ActionLogRepository;

// ==========================================
// Request DTOs
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportScrapRequest {
    pub scrap_class: ScrapClass,
    pub quantity: f64,
    /// Falls back to the configured default unit when absent
    pub unit: Option<String>,
    pub reporter: String,
    pub reason_code: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteBatchRequest {
    pub batch_id: String,
    pub final_output_quantity: f64,
    pub notes: Option<String>,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartProcessRequest {
    pub batch_id: String,
    pub drobilka_type: DrobilkaType,
    pub input_quantity: f64,
    pub work_center: String,
    pub lead_operator: String,
    #[serde(default)]
    pub operators: Vec<String>,
}

// ==========================================
// Snapshot
// ==========================================

/// Everything a dashboard shows, read in one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub totals: ScrapTotals,
    pub active_batch: Option<RecyclingBatch>,
    /// Runs of the active batch (empty without one)
    pub processes: Vec<DrobilkaProcess>,
    pub can_complete: bool,
    /// Why the active batch cannot be completed yet (empty when it can)
    pub completion_blockers: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

impl WorkflowSnapshot {
    /// Assemble from independently fetched parts, evaluating the gate fresh
    pub fn assemble(
        totals: ScrapTotals,
        active_batch: Option<RecyclingBatch>,
        processes: Vec<DrobilkaProcess>,
    ) -> Self {
        let (can_complete, completion_blockers) = match &active_batch {
            Some(batch) => {
                let verdict = CompletionGate::evaluate(batch, &processes);
                (verdict.is_ready(), blocker_messages(&verdict))
            }
            None => (false, vec!["no active batch".to_string()]),
        };
        Self {
            totals,
            active_batch,
            processes,
            can_complete,
            completion_blockers,
            captured_at: Utc::now(),
        }
    }
}

fn blocker_messages(verdict: &GateVerdict) -> Vec<String> {
    verdict
        .missing
        .iter()
        .map(|t| format!("{} has no completed drobilka run", t.line_name()))
        .collect()
}

// ==========================================
// RecyclingApi
// ==========================================

pub struct RecyclingApi {
    ledger: Arc<ScrapLedger>,
    batch_manager: Arc<RecyclingBatchManager>,
    tracker: Arc<DrobilkaProcessTracker>,
    action_log_repo: Arc<ActionLogRepository>,
    default_unit: String,
}

impl RecyclingApi {
    pub fn new(
        ledger: Arc<ScrapLedger>,
        batch_manager: Arc<RecyclingBatchManager>,
        tracker: Arc<DrobilkaProcessTracker>,
        action_log_repo: Arc<ActionLogRepository>,
        default_unit: String,
    ) -> Self {
        Self {
            ledger,
            batch_manager,
            tracker,
            action_log_repo,
            default_unit,
        }
    }

    // ==========================================
    // Workflow queries
    // ==========================================

    pub fn get_current_totals(&self) -> ApiResult<ScrapTotals> {
        Ok(self.ledger.current_totals()?)
    }

    pub fn get_active_batch(&self) -> ApiResult<Option<RecyclingBatch>> {
        Ok(self.batch_manager.get_active_batch()?)
    }

    /// Runs of one batch, or all runs when `batch_id` is None
    pub fn list_drobilka_processes(
        &self,
        batch_id: Option<&str>,
    ) -> ApiResult<Vec<DrobilkaProcess>> {
        let batch_id = batch_id.map(str::trim).filter(|id| !id.is_empty());
        Ok(self.tracker.list_processes(batch_id)?)
    }

    pub fn get_batch(&self, batch_id: &str) -> ApiResult<RecyclingBatch> {
        require_id("batch_id", batch_id)?;
        Ok(self.batch_manager.get_batch(batch_id)?)
    }

    pub fn list_batches(&self, limit: u32) -> ApiResult<Vec<RecyclingBatch>> {
        if limit == 0 {
            return Err(ApiError::InvalidInput("limit must be at least 1".to_string()));
        }
        Ok(self.batch_manager.list_batches(limit)?)
    }

    pub fn get_process(&self, process_id: &str) -> ApiResult<DrobilkaProcess> {
        require_id("process_id", process_id)?;
        Ok(self.tracker.get_process(process_id)?)
    }

    pub fn list_recyclings(&self, batch_id: &str) -> ApiResult<Vec<Recycling>> {
        require_id("batch_id", batch_id)?;
        Ok(self.batch_manager.list_recyclings(batch_id)?)
    }

    /// Gate verdict for any batch, recomputed from stored runs
    pub fn evaluate_completion(&self, batch_id: &str) -> ApiResult<GateVerdict> {
        let batch = self.get_batch(batch_id)?;
        let processes = self.tracker.list_processes(Some(&batch.batch_id))?;
        Ok(CompletionGate::evaluate(&batch, &processes))
    }

    pub fn get_workflow_snapshot(&self) -> ApiResult<WorkflowSnapshot> {
        let totals = self.get_current_totals()?;
        let active_batch = self.get_active_batch()?;
        let processes = match &active_batch {
            Some(batch) => self.tracker.list_processes(Some(&batch.batch_id))?,
            None => Vec::new(),
        };
        Ok(WorkflowSnapshot::assemble(totals, active_batch, processes))
    }

    // ==========================================
    // Workflow commands
    // ==========================================

    pub fn start_batch(&self, initiator: &str) -> ApiResult<RecyclingBatch> {
        Ok(self.batch_manager.start_batch(initiator)?)
    }

    pub fn complete_batch(&self, request: CompleteBatchRequest) -> ApiResult<RecyclingBatch> {
        require_id("batch_id", &request.batch_id)?;
        Ok(self.batch_manager.complete_batch(
            &request.batch_id,
            request.final_output_quantity,
            request.notes,
            &request.actor,
        )?)
    }

    pub fn start_drobilka_process(
        &self,
        request: StartProcessRequest,
    ) -> ApiResult<DrobilkaProcess> {
        require_id("batch_id", &request.batch_id)?;
        Ok(self.tracker.start_process(ProcessStart {
            batch_id: request.batch_id.trim().to_string(),
            drobilka_type: request.drobilka_type,
            input_quantity: request.input_quantity,
            work_center: request.work_center,
            lead_operator: request.lead_operator,
            operators: request.operators,
        })?)
    }

    pub fn complete_drobilka_process(
        &self,
        process_id: &str,
        output_quantity: f64,
    ) -> ApiResult<DrobilkaProcess> {
        require_id("process_id", process_id)?;
        Ok(self.tracker.complete_process(process_id, output_quantity)?)
    }

    // ==========================================
    // Scrap intake
    // ==========================================

    pub fn report_scrap(&self, request: ReportScrapRequest) -> ApiResult<ScrapRecord> {
        let unit = request
            .unit
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.default_unit.clone());
        Ok(self.ledger.report_scrap(ScrapReport {
            scrap_class: request.scrap_class,
            quantity: request.quantity,
            unit,
            reporter: request.reporter,
            reason_code: request.reason_code,
            notes: request.notes,
        })?)
    }

    pub fn confirm_scrap(&self, scrap_id: &str, actor: &str) -> ApiResult<ScrapRecord> {
        require_id("scrap_id", scrap_id)?;
        Ok(self.ledger.confirm_scrap(scrap_id, actor)?)
    }

    pub fn write_off_scrap(
        &self,
        scrap_id: &str,
        actor: &str,
        reason: &str,
    ) -> ApiResult<ScrapRecord> {
        require_id("scrap_id", scrap_id)?;
        Ok(self.ledger.write_off_scrap(scrap_id, actor, reason)?)
    }

    pub fn get_scrap(&self, scrap_id: &str) -> ApiResult<ScrapRecord> {
        require_id("scrap_id", scrap_id)?;
        Ok(self.ledger.get_scrap(scrap_id)?)
    }

    pub fn list_scrap(&self, status: Option<ScrapStatus>) -> ApiResult<Vec<ScrapRecord>> {
        Ok(self.ledger.list_scrap(status)?)
    }

    // ==========================================
    // Audit
    // ==========================================

    pub fn list_action_logs(&self, limit: u32) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_recent(limit)?)
    }

    pub fn list_action_logs_by_batch(&self, batch_id: &str) -> ApiResult<Vec<ActionLog>> {
        require_id("batch_id", batch_id)?;
        Ok(self.action_log_repo.find_by_batch_id(batch_id)?)
    }
}

fn require_id(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
