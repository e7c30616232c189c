// ==========================================
// Workflow poller tests
// ==========================================
// Poll loop against a scripted source and against the local database:
// initial load, error retention, recovery, manual refresh, auto-refresh
// toggle, error backoff on a paused clock, push refresh on committed
// changes, shutdown
// ==========================================


#[cfg(test)]
mod workflow_poller_test {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use futures::future::join_all;
    use tokio::sync::watch;
    use tokio::time::Instant;

    use scrap_recycling::api::{ApiError, ApiResult};
    use scrap_recycling::config::PollerConfig;
    use scrap_recycling::poller::{PollerHandle, WorkflowPoller, WorkflowSource, WorkflowView};
    use scrap_recycling::{DrobilkaProcess, DrobilkaType, RecyclingBatch, ScrapClass, ScrapTotals};

    use crate::test_helpers::{approx_eq, create_test_state, report, seed_totals};

    const WAIT: Duration = Duration::from_secs(5);
    // virtual time; only used by paused-clock tests
    const BACKOFF_WAIT: Duration = Duration::from_secs(3600);

    // ==========================================
    // Scripted source
    // ==========================================

    #[derive(Default)]
    struct ScriptedSource {
        totals: Mutex<ScrapTotals>,
        batch: Mutex<Option<RecyclingBatch>>,
        processes: Mutex<Vec<DrobilkaProcess>>,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn with_totals(hard: f64, soft: f64) -> Arc<Self> {
            let source = Self::default();
            *source.totals.lock().unwrap() = ScrapTotals {
                hard_total: hard,
                soft_total: soft,
            };
            Arc::new(source)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of totals reads, i.e. refresh attempts
        fn refreshes(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check(&self) -> ApiResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ApiError::TransientIo("connection refused".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl WorkflowSource for ScriptedSource {
        async fn current_totals(&self) -> ApiResult<ScrapTotals> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(*self.totals.lock().unwrap())
        }

        async fn active_batch(&self) -> ApiResult<Option<RecyclingBatch>> {
            self.check()?;
            Ok(self.batch.lock().unwrap().clone())
        }

        async fn list_processes(&self, batch_id: &str) -> ApiResult<Vec<DrobilkaProcess>> {
            self.check()?;
            Ok(self
                .processes
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.batch_id == batch_id)
                .cloned()
                .collect())
        }
    }

    fn completed_run(batch: &RecyclingBatch, line: DrobilkaType) -> DrobilkaProcess {
        let mut p = DrobilkaProcess::start(
            batch.batch_id.clone(),
            line,
            10.0,
            "WC-1".to_string(),
            "lead".to_string(),
            vec![],
        );
        p.completed_at = Some(Utc::now());
        p.output_quantity = Some(9.0);
        p
    }

    fn manual_config() -> PollerConfig {
        PollerConfig::default()
            .with_interval(Duration::from_secs(3600))
            .with_auto_refresh(false)
    }

    fn fast_config() -> PollerConfig {
        PollerConfig::default()
            .with_interval(Duration::from_millis(10))
            .with_auto_refresh(true)
            .with_max_backoff(Duration::from_millis(10))
    }

    fn backoff_config() -> PollerConfig {
        PollerConfig::default()
            .with_interval(Duration::from_secs(1))
            .with_auto_refresh(true)
            .with_max_backoff(Duration::from_secs(300))
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<WorkflowView>, predicate: F) -> WorkflowView
    where
        F: FnMut(&WorkflowView) -> bool,
    {
        wait_within(rx, WAIT, predicate).await
    }

    async fn wait_within<F>(
        rx: &mut watch::Receiver<WorkflowView>,
        limit: Duration,
        mut predicate: F,
    ) -> WorkflowView
    where
        F: FnMut(&WorkflowView) -> bool,
    {
        let view = tokio::time::timeout(limit, rx.wait_for(|v| predicate(v)))
            .await
            .expect("timed out waiting for workflow view")
            .expect("poller stopped");
        WorkflowView::clone(&view)
    }

    async fn started(source: Arc<ScriptedSource>, config: PollerConfig) -> PollerHandle {
        let handle = WorkflowPoller::new(source, config).start();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |v| v.refresh_count >= 1).await;
        handle
    }

    // ==========================================
    // Tests
    // ==========================================

    #[tokio::test]
    async fn test_initial_load_without_auto_refresh() {
        let source = ScriptedSource::with_totals(120.0, 80.0);
        let handle = started(source.clone(), manual_config()).await;

        let view = handle.view();
        assert_eq!(view.refresh_count, 1);
        assert!(!view.auto_refresh);
        assert!(!view.is_stale());
        let snapshot = view.snapshot.unwrap();
        assert!(approx_eq(snapshot.totals.hard_total, 120.0));
        assert!(snapshot.active_batch.is_none());
        assert!(!snapshot.can_complete);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.refreshes(), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_refresh_now_sees_gate_change() {
        let source = ScriptedSource::with_totals(0.0, 0.0);
        let batch = RecyclingBatch::start(
            1,
            ScrapTotals {
                hard_total: 10.0,
                soft_total: 10.0,
            },
            "lead".to_string(),
        );
        *source.batch.lock().unwrap() = Some(batch.clone());
        source
            .processes
            .lock()
            .unwrap()
            .push(completed_run(&batch, DrobilkaType::Hard));

        let handle = started(source.clone(), manual_config()).await;
        assert!(!handle.view().can_complete());

        source
            .processes
            .lock()
            .unwrap()
            .push(completed_run(&batch, DrobilkaType::Soft));

        let view = handle.refresh_now().await.unwrap();
        assert!(view.can_complete());
        assert_eq!(view.refresh_count, 2);
        assert_eq!(handle.view(), view);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_snapshot_then_recovers() {
        let source = ScriptedSource::with_totals(5.0, 5.0);
        let handle = started(source.clone(), manual_config()).await;
        let good = handle.view().snapshot.unwrap();

        source.set_failing(true);
        let view = handle.refresh_now().await.unwrap();
        assert_eq!(view.consecutive_errors, 1);
        assert!(view.is_stale());
        assert!(view.last_error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(view.snapshot.as_ref(), Some(&good));

        let view = handle.refresh_now().await.unwrap();
        assert_eq!(view.consecutive_errors, 2);
        assert_eq!(view.refresh_count, 1);

        source.set_failing(false);
        *source.totals.lock().unwrap() = ScrapTotals {
            hard_total: 7.0,
            soft_total: 5.0,
        };
        let view = handle.refresh_now().await.unwrap();
        assert_eq!(view.consecutive_errors, 0);
        assert!(!view.is_stale());
        assert_eq!(view.refresh_count, 2);
        assert!(approx_eq(view.snapshot.unwrap().totals.hard_total, 7.0));

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_first_load_failure_leaves_no_snapshot() {
        let source = ScriptedSource::with_totals(1.0, 1.0);
        source.set_failing(true);

        let handle = WorkflowPoller::new(source.clone(), fast_config()).start();
        let mut rx = handle.subscribe();
        let view = wait_for(&mut rx, |v| v.consecutive_errors >= 3).await;

        assert!(view.snapshot.is_none());
        assert!(view.is_stale());
        assert!(!view.can_complete());
        assert_eq!(view.refresh_count, 0);

        source.set_failing(false);
        let view = wait_for(&mut rx, |v| v.snapshot.is_some()).await;
        assert_eq!(view.consecutive_errors, 0);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_auto_refresh_ticks_and_toggles() {
        let source = ScriptedSource::with_totals(2.0, 0.0);
        let handle = WorkflowPoller::new(source.clone(), fast_config()).start();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |v| v.refresh_count >= 3).await;

        handle.set_auto_refresh(false).await.unwrap();
        // commands run in order, so the toggle has been applied once this returns
        let view = handle.refresh_now().await.unwrap();
        assert!(!view.auto_refresh);

        let settled = source.refreshes();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(source.refreshes(), settled);

        handle.set_auto_refresh(true).await.unwrap();
        let resumed_from = handle.view().refresh_count;
        let view = wait_for(&mut rx, |v| v.refresh_count >= resumed_from + 2).await;
        assert!(view.auto_refresh);

        handle.stop().await;
    }

    // ==========================================
    // Error backoff (paused clock)
    // ==========================================

    /// Virtual time until the view satisfies `predicate`
    async fn time_until<F>(rx: &mut watch::Receiver<WorkflowView>, predicate: F) -> Duration
    where
        F: FnMut(&WorkflowView) -> bool,
    {
        let from = Instant::now();
        wait_within(rx, BACKOFF_WAIT, predicate).await;
        from.elapsed()
    }

    fn assert_about(actual: Duration, expected_secs: u64) {
        let expected = Duration::from_secs(expected_secs);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(100),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_with_consecutive_errors() {
        let source = ScriptedSource::with_totals(1.0, 1.0);
        source.set_failing(true);

        let handle = WorkflowPoller::new(source.clone(), backoff_config()).start();
        let mut rx = handle.subscribe();
        wait_within(&mut rx, BACKOFF_WAIT, |v| v.consecutive_errors >= 1).await;

        // one period plus 2^n seconds after the n-th failure
        assert_about(time_until(&mut rx, |v| v.consecutive_errors >= 2).await, 1 + 2);
        assert_about(time_until(&mut rx, |v| v.consecutive_errors >= 3).await, 1 + 4);
        assert_about(time_until(&mut rx, |v| v.consecutive_errors >= 4).await, 1 + 8);
        assert_eq!(source.refreshes(), 4);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let source = ScriptedSource::with_totals(1.0, 1.0);
        source.set_failing(true);

        let config = backoff_config().with_max_backoff(Duration::from_secs(3));
        let handle = WorkflowPoller::new(source.clone(), config).start();
        let mut rx = handle.subscribe();
        wait_within(&mut rx, BACKOFF_WAIT, |v| v.consecutive_errors >= 3).await;

        assert_about(time_until(&mut rx, |v| v.consecutive_errors >= 4).await, 1 + 3);
        assert_about(time_until(&mut rx, |v| v.consecutive_errors >= 5).await, 1 + 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_resets_after_success() {
        let source = ScriptedSource::with_totals(1.0, 1.0);
        source.set_failing(true);

        let handle = WorkflowPoller::new(source.clone(), backoff_config()).start();
        let mut rx = handle.subscribe();
        wait_within(&mut rx, BACKOFF_WAIT, |v| v.consecutive_errors >= 2).await;

        source.set_failing(false);
        // still waiting out the 2^2 s backoff
        assert_about(time_until(&mut rx, |v| v.snapshot.is_some()).await, 1 + 4);

        // back to the plain period
        assert_about(time_until(&mut rx, |v| v.refresh_count >= 2).await, 1);
        assert_about(time_until(&mut rx, |v| v.refresh_count >= 3).await, 1);
        assert_eq!(handle.view().consecutive_errors, 0);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_not_held_by_backoff() {
        let source = ScriptedSource::with_totals(4.0, 2.0);
        source.set_failing(true);

        let handle = WorkflowPoller::new(source.clone(), backoff_config()).start();
        let mut rx = handle.subscribe();
        wait_within(&mut rx, BACKOFF_WAIT, |v| v.consecutive_errors >= 5).await;

        // well inside the 1 + 32 s wait for the next tick
        tokio::time::sleep(Duration::from_secs(2)).await;
        source.set_failing(false);

        let asked = Instant::now();
        let view = tokio::time::timeout(Duration::from_millis(100), handle.refresh_now())
            .await
            .expect("manual refresh waited for the backoff")
            .unwrap();
        assert!(asked.elapsed() < Duration::from_millis(100));
        assert_eq!(view.consecutive_errors, 0);
        assert!(approx_eq(view.snapshot.unwrap().totals.hard_total, 4.0));

        // the timer restarts from the successful refresh
        assert_about(time_until(&mut rx, |v| v.refresh_count >= 2).await, 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_not_held_by_backoff() {
        let source = ScriptedSource::with_totals(1.0, 1.0);
        source.set_failing(true);

        let handle = WorkflowPoller::new(source.clone(), backoff_config()).start();
        let mut rx = handle.subscribe();
        wait_within(&mut rx, BACKOFF_WAIT, |v| v.consecutive_errors >= 4).await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let asked = Instant::now();
        tokio::time::timeout(Duration::from_millis(100), handle.stop())
            .await
            .expect("stop waited for the backoff");
        assert!(asked.elapsed() < Duration::from_millis(100));
        assert_eq!(source.refreshes(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_manual_refreshes() {
        let source = ScriptedSource::with_totals(3.0, 3.0);
        let handle = started(source.clone(), manual_config()).await;

        let views = join_all((0..4).map(|_| handle.refresh_now())).await;
        assert!(views.iter().all(|v| v.is_ok()));

        let mut counts: Vec<u64> = views.into_iter().map(|v| v.unwrap().refresh_count).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![2, 3, 4, 5]);
        assert_eq!(source.refreshes(), 5);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_publishes_nothing_afterwards() {
        let source = ScriptedSource::with_totals(1.0, 0.0);
        let handle = WorkflowPoller::new(source.clone(), fast_config()).start();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |v| v.refresh_count >= 2).await;

        let token = handle.cancellation_token();
        handle.stop().await;
        assert!(token.is_cancelled());

        let after_stop = source.refreshes();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.refreshes(), after_stop);
        assert!(rx.has_changed().is_err());
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_loop() {
        let source = ScriptedSource::with_totals(1.0, 0.0);
        let handle = WorkflowPoller::new(source.clone(), fast_config()).start();
        let token = handle.cancellation_token();
        drop(handle);
        assert!(token.is_cancelled());
    }

    // ==========================================
    // Local database + committed-change events
    // ==========================================

    #[tokio::test]
    async fn test_committed_change_triggers_refresh() {
        let (_tmp, state) = create_test_state();
        seed_totals(&state.recycling_api, 4.0, 0.0);

        let handle = WorkflowPoller::new(state.local_source(), manual_config())
            .with_event_stream(state.subscribe_events())
            .start();
        let mut rx = handle.subscribe();
        let first = wait_for(&mut rx, |v| v.refresh_count >= 1).await;
        assert!(approx_eq(first.snapshot.unwrap().totals.hard_total, 4.0));

        let api = state.recycling_api.clone();
        tokio::task::spawn_blocking(move || report(&api, ScrapClass::Soft, 6.0))
            .await
            .unwrap();

        // auto refresh is off, so only the event can have caused this
        let view = wait_for(&mut rx, |v| {
            v.snapshot
                .as_ref()
                .map(|s| approx_eq(s.totals.soft_total, 6.0))
                .unwrap_or(false)
        })
        .await;
        assert!(view.snapshot.unwrap().active_batch.is_none());

        let api = state.recycling_api.clone();
        let batch = tokio::task::spawn_blocking(move || api.start_batch("lead"))
            .await
            .unwrap()
            .unwrap();
        let view = wait_for(&mut rx, |v| {
            v.snapshot
                .as_ref()
                .and_then(|s| s.active_batch.as_ref())
                .is_some()
        })
        .await;
        let snapshot = view.snapshot.unwrap();
        assert_eq!(snapshot.active_batch.unwrap().batch_id, batch.batch_id);
        assert!(snapshot.totals.is_empty());

        handle.stop().await;
    }
}
