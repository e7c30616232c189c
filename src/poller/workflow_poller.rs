// ==========================================
// Scrap Recycling - Workflow Poller
// ==========================================
// Periodic full resync of the workflow view:
//   totals -> active batch -> runs of that batch -> gate verdict
// The view is replaced wholesale; a failed tick keeps the last good data.
// After consecutive failures the next timer tick is pushed out by 2^n
// seconds (capped at max_backoff); commands and events are still served
// while the timer waits. Committed-change events, when wired, trigger an
// immediate refresh.
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::error::{ApiError, ApiResult};
use crate::api::recycling_api::WorkflowSnapshot;
use crate::config::poller_config::PollerConfig;
use crate::engine::events::WorkflowEvent;
use crate::poller::source::WorkflowSource;
use crate::poller::view::WorkflowView;

const COMMAND_BUFFER: usize = 16;

enum PollerCommand {
    Refresh(oneshot::Sender<WorkflowView>),
    SetAutoRefresh(bool),
}

// ==========================================
// WorkflowPoller
// ==========================================
pub struct WorkflowPoller {
    source: Arc<dyn WorkflowSource>,
    config: PollerConfig,
    events: Option<broadcast::Receiver<WorkflowEvent>>,
}

impl WorkflowPoller {
    pub fn new(source: Arc<dyn WorkflowSource>, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            events: None,
        }
    }

    /// Refresh immediately whenever a committed change is announced
    pub fn with_event_stream(mut self, events: broadcast::Receiver<WorkflowEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Spawn the poll loop on the current tokio runtime
    pub fn start(self) -> PollerHandle {
        let (view_tx, view_rx) = watch::channel(WorkflowView::initial(self.config.auto_refresh));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(self.run(view_tx, cmd_rx, cancel.clone()));

        PollerHandle {
            view_rx,
            cmd_tx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(
        self,
        view_tx: watch::Sender<WorkflowView>,
        mut cmd_rx: mpsc::Receiver<PollerCommand>,
        cancel: CancellationToken,
    ) {
        let WorkflowPoller {
            source,
            config,
            mut events,
        } = self;

        tracing::info!(
            poll_interval_ms = config.interval.as_millis() as u64,
            auto_refresh = config.auto_refresh,
            max_backoff_secs = config.max_backoff.as_secs(),
            "Workflow poller started"
        );

        let mut auto_refresh = config.auto_refresh;
        let mut view = WorkflowView::initial(auto_refresh);

        // initial load, then the timer takes over one period later
        match refresh(source.as_ref(), &view, &cancel).await {
            Some(next) => {
                view = next;
                view_tx.send_replace(view.clone());
            }
            None => {
                tracing::info!("Workflow poller stopped");
                return;
            }
        }

        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        schedule_next_tick(&mut interval, &view, &config);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                cmd = cmd_rx.recv() => match cmd {
                    Some(PollerCommand::Refresh(reply)) => {
                        let Some(next) = refresh(source.as_ref(), &view, &cancel).await else {
                            break;
                        };
                        view = next;
                        view_tx.send_replace(view.clone());
                        schedule_next_tick(&mut interval, &view, &config);
                        let _ = reply.send(view.clone());
                    }
                    Some(PollerCommand::SetAutoRefresh(enabled)) => {
                        if enabled && !auto_refresh {
                            schedule_next_tick(&mut interval, &view, &config);
                        }
                        auto_refresh = enabled;
                        view.auto_refresh = enabled;
                        view_tx.send_replace(view.clone());
                        tracing::info!(auto_refresh = enabled, "Workflow poller auto refresh toggled");
                    }
                    None => break,
                },

                event = next_event(&mut events) => match event {
                    Ok(event) => {
                        tracing::debug!(
                            event_type = event.event_type.as_str(),
                            "Refreshing workflow view after committed change"
                        );
                        let Some(next) = refresh(source.as_ref(), &view, &cancel).await else {
                            break;
                        };
                        view = next;
                        view_tx.send_replace(view.clone());
                        schedule_next_tick(&mut interval, &view, &config);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Workflow event stream lagged, refreshing");
                        let Some(next) = refresh(source.as_ref(), &view, &cancel).await else {
                            break;
                        };
                        view = next;
                        view_tx.send_replace(view.clone());
                        schedule_next_tick(&mut interval, &view, &config);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Workflow event stream closed");
                        events = None;
                    }
                },

                _ = interval.tick(), if auto_refresh => {
                    let Some(next) = refresh(source.as_ref(), &view, &cancel).await else {
                        break;
                    };
                    view = next;
                    view_tx.send_replace(view.clone());
                    schedule_next_tick(&mut interval, &view, &config);
                }
            }
        }

        tracing::info!("Workflow poller stopped");
    }
}

/// One full resync; None when cancelled mid-fetch
async fn refresh(
    source: &dyn WorkflowSource,
    current: &WorkflowView,
    cancel: &CancellationToken,
) -> Option<WorkflowView> {
    let result = tokio::select! {
        _ = cancel.cancelled() => return None,
        result = fetch_snapshot(source) => result,
    };
    if cancel.is_cancelled() {
        return None;
    }

    Some(match result {
        Ok(snapshot) => {
            tracing::debug!(
                active_batch = snapshot.active_batch.as_ref().map(|b| b.batch_number),
                processes = snapshot.processes.len(),
                can_complete = snapshot.can_complete,
                "Workflow view refreshed"
            );
            current.with_snapshot(snapshot)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                consecutive_errors = current.consecutive_errors.saturating_add(1),
                "Failed to refresh workflow view"
            );
            current.with_error(e.to_string())
        }
    })
}

pub(crate) async fn fetch_snapshot(source: &dyn WorkflowSource) -> ApiResult<WorkflowSnapshot> {
    let totals = source.current_totals().await?;
    let active_batch = source.active_batch().await?;
    let processes = match &active_batch {
        Some(batch) => source.list_processes(&batch.batch_id).await?,
        None => Vec::new(),
    };
    Ok(WorkflowSnapshot::assemble(totals, active_batch, processes))
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<WorkflowEvent>>,
) -> Result<WorkflowEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Arm the timer relative to the refresh that just finished
///
/// One period after a success; one period plus the backoff after a failure.
fn schedule_next_tick(interval: &mut Interval, view: &WorkflowView, config: &PollerConfig) {
    if view.consecutive_errors == 0 {
        interval.reset();
        return;
    }
    let backoff = calculate_backoff(view.consecutive_errors, config.max_backoff);
    tracing::debug!(
        backoff_ms = backoff.as_millis() as u64,
        consecutive_errors = view.consecutive_errors,
        "Backing off after errors"
    );
    interval.reset_after(config.interval + backoff);
}

/// Exponential backoff: 2^n seconds, capped at `max`
fn calculate_backoff(consecutive_errors: u32, max: Duration) -> Duration {
    let secs = 2u64.saturating_pow(consecutive_errors.min(20));
    Duration::from_secs(secs).min(max)
}

// ==========================================
// PollerHandle
// ==========================================

/// Control surface of a running poller
pub struct PollerHandle {
    view_rx: watch::Receiver<WorkflowView>,
    cmd_tx: mpsc::Sender<PollerCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<WorkflowView> {
        self.view_rx.clone()
    }

    /// Latest published view
    pub fn view(&self) -> WorkflowView {
        self.view_rx.borrow().clone()
    }

    /// Run one full refresh now and return the resulting view
    pub async fn refresh_now(&self) -> ApiResult<WorkflowView> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(PollerCommand::Refresh(reply_tx))
            .await
            .map_err(|_| ApiError::InternalError("workflow poller is stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| ApiError::InternalError("workflow poller is stopped".to_string()))
    }

    /// Toggle the periodic timer; manual refresh keeps working
    pub async fn set_auto_refresh(&self, enabled: bool) -> ApiResult<()> {
        self.cmd_tx
            .send(PollerCommand::SetAutoRefresh(enabled))
            .await
            .map_err(|_| ApiError::InternalError("workflow poller is stopped".to_string()))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the loop and wait for it to exit
    ///
    /// No view is published after this returns.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Workflow poller task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
