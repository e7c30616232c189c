// ==========================================
// Scrap Recycling - Scrap Ledger
// ==========================================
// Owns scrap intake and the uncollected totals.
// Uncollected = PENDING or CONFIRMED; CLAIMED records already belong to a
// batch and never count again.
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::scrap::{ScrapRecord, ScrapTotals};
use crate::domain::types::{ScrapClass, ScrapStatus};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::events::{OptionalEventPublisher, WorkflowEvent};
use crate::engine::lock::WorkflowLock;
use crate::engine::repositories::record_action;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::scrap_repo::ScrapRecordRepository;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Scrap report form input
#[derive(Debug, Clone)]
pub struct ScrapReport {
    pub scrap_class: ScrapClass,
    pub quantity: f64,
    pub unit: String,
    pub reporter: String,
    pub reason_code: Option<String>,
    pub notes: Option<String>,
}

pub struct ScrapLedger {
    scrap_repo: Arc<ScrapRecordRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    lock: WorkflowLock,
    publisher: OptionalEventPublisher,
}

impl ScrapLedger {
    pub fn new(
        scrap_repo: Arc<ScrapRecordRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        lock: WorkflowLock,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            scrap_repo,
            action_log_repo,
            lock,
            publisher,
        }
    }

    // ==========================================
    // Queries
    // ==========================================

    /// Hard/soft sums over uncollected records, computed in SQL
    pub fn current_totals(&self) -> WorkflowResult<ScrapTotals> {
        Ok(self.scrap_repo.sum_uncollected()?)
    }

    /// Uncollected records plus totals derived from that same read
    ///
    /// Caller must hold the workflow lock so the snapshot stays valid
    /// until the records are claimed.
    pub(crate) fn uncollected_snapshot(&self) -> WorkflowResult<(Vec<ScrapRecord>, ScrapTotals)> {
        let records = self.scrap_repo.find_uncollected()?;
        let totals = ScrapTotals::from_records(records.iter());
        Ok((records, totals))
    }

    pub fn get_scrap(&self, scrap_id: &str) -> WorkflowResult<ScrapRecord> {
        self.scrap_repo
            .find_by_id(scrap_id)?
            .ok_or_else(|| WorkflowError::not_found("ScrapRecord", scrap_id))
    }

    pub fn list_scrap(&self, status: Option<ScrapStatus>) -> WorkflowResult<Vec<ScrapRecord>> {
        Ok(self.scrap_repo.list(status)?)
    }

    // ==========================================
    // Commands
    // ==========================================

    #[instrument(skip(self, report), fields(class = %report.scrap_class, quantity = report.quantity))]
    pub fn report_scrap(&self, report: ScrapReport) -> WorkflowResult<ScrapRecord> {
        if !report.quantity.is_finite() || report.quantity <= 0.0 {
            return Err(WorkflowError::InvalidInput(format!(
                "scrap quantity must be a positive number, got {}",
                report.quantity
            )));
        }
        if report.reporter.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "reporter must not be blank".to_string(),
            ));
        }
        if report.unit.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "unit must not be blank".to_string(),
            ));
        }

        let _guard = self.lock.acquire()?;

        let record = ScrapRecord::new(
            report.scrap_class,
            report.quantity,
            report.unit.trim().to_string(),
            report.reporter.trim().to_string(),
            report.reason_code,
            report.notes,
        );
        self.scrap_repo.insert(&record)?;
        let stored = self.get_scrap(&record.scrap_id)?;

        self.log_action(
            ActionLog::new(ActionType::ReportScrap, &stored.reporter)
                .with_scrap(&stored.scrap_id)
                .with_payload(json!({
                    "scrap_class": stored.scrap_class.to_db_str(),
                    "quantity": stored.quantity,
                    "unit": stored.unit,
                    "reason_code": stored.reason_code,
                }))
                .with_detail(format!(
                    "reported {} {} of {} scrap",
                    stored.quantity, stored.unit, stored.scrap_class
                )),
        );
        self.publisher
            .publish_committed(WorkflowEvent::scrap_changed(&stored.scrap_id));

        info!(scrap_id = %stored.scrap_id, "scrap reported");
        Ok(stored)
    }

    /// PENDING -> CONFIRMED
    #[instrument(skip(self))]
    pub fn confirm_scrap(&self, scrap_id: &str, actor: &str) -> WorkflowResult<ScrapRecord> {
        require_actor(actor)?;
        let _guard = self.lock.acquire()?;

        self.transition(
            scrap_id,
            &[ScrapStatus::Pending],
            ScrapStatus::Confirmed,
        )?;
        let stored = self.get_scrap(scrap_id)?;

        self.log_action(
            ActionLog::new(ActionType::ConfirmScrap, actor)
                .with_scrap(scrap_id)
                .with_detail("scrap confirmed"),
        );
        self.publisher
            .publish_committed(WorkflowEvent::scrap_changed(scrap_id));

        info!(scrap_id, actor, "scrap confirmed");
        Ok(stored)
    }

    /// PENDING|CONFIRMED -> WRITTEN_OFF
    #[instrument(skip(self))]
    pub fn write_off_scrap(
        &self,
        scrap_id: &str,
        actor: &str,
        reason: &str,
    ) -> WorkflowResult<ScrapRecord> {
        require_actor(actor)?;
        if reason.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "write-off reason must not be blank".to_string(),
            ));
        }
        let _guard = self.lock.acquire()?;

        self.transition(
            scrap_id,
            &[ScrapStatus::Pending, ScrapStatus::Confirmed],
            ScrapStatus::WrittenOff,
        )?;
        let stored = self.get_scrap(scrap_id)?;

        self.log_action(
            ActionLog::new(ActionType::WriteOffScrap, actor)
                .with_scrap(scrap_id)
                .with_payload(json!({ "reason": reason.trim() }))
                .with_detail(format!("scrap written off: {}", reason.trim())),
        );
        self.publisher
            .publish_committed(WorkflowEvent::scrap_changed(scrap_id));

        info!(scrap_id, actor, "scrap written off");
        Ok(stored)
    }

    // ==========================================
    // Internals
    // ==========================================

    fn transition(
        &self,
        scrap_id: &str,
        from: &[ScrapStatus],
        to: ScrapStatus,
    ) -> WorkflowResult<()> {
        let current = self.get_scrap(scrap_id)?;
        if !from.contains(&current.status) {
            return Err(WorkflowError::InvalidState(format!(
                "scrap {} is {}, cannot move to {}",
                scrap_id, current.status, to
            )));
        }

        let rows = self
            .scrap_repo
            .transition_status(scrap_id, from, to, Utc::now())?;
        if rows == 0 {
            return Err(WorkflowError::InvalidState(format!(
                "scrap {} changed state concurrently",
                scrap_id
            )));
        }
        Ok(())
    }

    fn log_action(&self, log: ActionLog) {
        record_action(&self.action_log_repo, log);
    }
}

pub(crate) fn require_actor(actor: &str) -> WorkflowResult<()> {
    if actor.trim().is_empty() {
        return Err(WorkflowError::InvalidInput(
            "actor must not be blank".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ensure_schema;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn ledger() -> ScrapLedger {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        ScrapLedger::new(
            Arc::new(ScrapRecordRepository::new(conn.clone())),
            Arc::new(ActionLogRepository::new(conn)),
            WorkflowLock::new(),
            OptionalEventPublisher::none(),
        )
    }

    fn report(class: ScrapClass, quantity: f64) -> ScrapReport {
        ScrapReport {
            scrap_class: class,
            quantity,
            unit: "kg".to_string(),
            reporter: "inspector".to_string(),
            reason_code: Some("EDGE_TRIM".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_totals_sum_pending_and_confirmed_only() {
        let ledger = ledger();
        let a = ledger.report_scrap(report(ScrapClass::Hard, 100.0)).unwrap();
        ledger.report_scrap(report(ScrapClass::Hard, 20.0)).unwrap();
        let c = ledger.report_scrap(report(ScrapClass::Soft, 80.0)).unwrap();
        let d = ledger.report_scrap(report(ScrapClass::Soft, 15.0)).unwrap();

        ledger.confirm_scrap(&a.scrap_id, "supervisor").unwrap();
        ledger.confirm_scrap(&c.scrap_id, "supervisor").unwrap();
        ledger
            .write_off_scrap(&d.scrap_id, "supervisor", "contaminated")
            .unwrap();

        let totals = ledger.current_totals().unwrap();
        assert!((totals.hard_total - 120.0).abs() < 1e-9);
        assert!((totals.soft_total - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_ledger_totals_are_zero() {
        let ledger = ledger();
        let totals = ledger.current_totals().unwrap();
        assert_eq!(totals.hard_total, 0.0);
        assert_eq!(totals.soft_total, 0.0);
        assert!(totals.is_empty());
    }

    #[test]
    fn test_report_rejects_non_positive_quantity() {
        let ledger = ledger();
        let err = ledger.report_scrap(report(ScrapClass::Hard, 0.0)).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
        let err = ledger
            .report_scrap(report(ScrapClass::Hard, f64::NAN))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }

    #[test]
    fn test_confirm_twice_is_invalid_state() {
        let ledger = ledger();
        let a = ledger.report_scrap(report(ScrapClass::Soft, 5.0)).unwrap();
        ledger.confirm_scrap(&a.scrap_id, "supervisor").unwrap();
        let err = ledger.confirm_scrap(&a.scrap_id, "supervisor").unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));
    }

    #[test]
    fn test_confirm_unknown_is_not_found() {
        let ledger = ledger();
        let err = ledger.confirm_scrap("missing", "supervisor").unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[test]
    fn test_write_off_preserves_reporter_notes() {
        let ledger = ledger();
        let mut input = report(ScrapClass::Hard, 5.0);
        input.notes = Some("found behind stand F3".to_string());
        let a = ledger.report_scrap(input).unwrap();

        let stored = ledger
            .write_off_scrap(&a.scrap_id, "supervisor", "wet")
            .unwrap();
        assert_eq!(stored.status, ScrapStatus::WrittenOff);
        assert_eq!(stored.notes.as_deref(), Some("found behind stand F3"));
        assert_eq!(
            ledger.list_scrap(Some(ScrapStatus::WrittenOff)).unwrap().len(),
            1
        );

        // the reason lives in the audit trail
        let logs = ledger.action_log_repo.find_recent(10).unwrap();
        let write_off = logs
            .iter()
            .find(|l| l.action_type == ActionType::WriteOffScrap)
            .unwrap();
        assert_eq!(write_off.scrap_id.as_deref(), Some(a.scrap_id.as_str()));
        assert_eq!(
            write_off.payload_json,
            Some(serde_json::json!({ "reason": "wet" }))
        );
    }
}
