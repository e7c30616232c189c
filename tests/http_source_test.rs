// ==========================================
// HTTP workflow source tests
// ==========================================
// HttpWorkflowSource against a mock console backend; every failure mode
// must surface as a retryable TRANSIENT_IO error
// ==========================================

#[cfg(test)]
mod http_source_test {
    use std::time::Duration;

    use chrono::Utc;
    use httpmock::prelude::*;
    use serde_json::json;

    use scrap_recycling::config::PollerConfig;
    use scrap_recycling::poller::{HttpWorkflowSource, WorkflowPoller, WorkflowSource};
    use scrap_recycling::{DrobilkaProcess, DrobilkaType, RecyclingBatch, ScrapTotals};

    fn batch() -> RecyclingBatch {
        RecyclingBatch::start(
            7,
            ScrapTotals {
                hard_total: 120.0,
                soft_total: 80.0,
            },
            "lead".to_string(),
        )
    }

    fn completed_run(batch: &RecyclingBatch, line: DrobilkaType) -> DrobilkaProcess {
        let mut p = DrobilkaProcess::start(
            batch.batch_id.clone(),
            line,
            100.0,
            "WC-DROB".to_string(),
            "lead".to_string(),
            vec!["helper".to_string()],
        );
        p.completed_at = Some(Utc::now());
        p.output_quantity = Some(95.0);
        p
    }

    #[tokio::test]
    async fn test_totals_accepts_camel_case_fields() {
        let server = MockServer::start_async().await;
        let totals_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/totals");
                then.status(200)
                    .json_body(json!({ "hardScrap": 120.0, "softScrap": 80.0 }));
            })
            .await;

        let source = HttpWorkflowSource::new(&server.base_url()).unwrap();
        let totals = source.current_totals().await.unwrap();

        assert_eq!(totals.hard_total, 120.0);
        assert_eq!(totals.soft_total, 80.0);
        totals_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_active_batch_absent_as_404_or_null() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/batches/active");
                then.status(404);
            })
            .await;

        let source = HttpWorkflowSource::new(&server.base_url()).unwrap();
        assert!(source.active_batch().await.unwrap().is_none());

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/batches/active");
                then.status(200)
                    .header("content-type", "application/json")
                    .body("null");
            })
            .await;

        let source = HttpWorkflowSource::new(&server.base_url()).unwrap();
        assert!(source.active_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_batch_and_processes_decoded() {
        let server = MockServer::start_async().await;
        let active = batch();
        let runs = vec![
            completed_run(&active, DrobilkaType::Hard),
            completed_run(&active, DrobilkaType::Soft),
        ];

        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/batches/active");
                then.status(200).json_body(serde_json::to_value(&active).unwrap());
            })
            .await;
        let runs_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/recycling/drobilka")
                    .query_param("batch_id", &active.batch_id);
                then.status(200).json_body(serde_json::to_value(&runs).unwrap());
            })
            .await;

        // trailing slash on the base url is tolerated
        let source = HttpWorkflowSource::new(&format!("{}/", server.base_url())).unwrap();

        let fetched = source.active_batch().await.unwrap().unwrap();
        assert_eq!(fetched, active);
        assert_eq!(fetched.label(), "RB-000007");

        let fetched_runs = source.list_processes(&active.batch_id).await.unwrap();
        assert_eq!(fetched_runs, runs);
        runs_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failures_are_transient_io() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/totals");
                then.status(500).body("boom");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/batches/active");
                then.status(200)
                    .header("content-type", "application/json")
                    .body("{not json");
            })
            .await;

        let source = HttpWorkflowSource::new(&server.base_url()).unwrap();

        let err = source.current_totals().await.unwrap_err();
        assert_eq!(err.code(), "TRANSIENT_IO");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("500"));

        let err = source.active_batch().await.unwrap_err();
        assert_eq!(err.code(), "TRANSIENT_IO");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transient_io() {
        // nothing listens on the discard port
        let source =
            HttpWorkflowSource::with_timeout("http://127.0.0.1:9", Duration::from_millis(500))
                .unwrap();
        let err = source.current_totals().await.unwrap_err();
        assert_eq!(err.code(), "TRANSIENT_IO");
    }

    #[tokio::test]
    async fn test_poller_over_http_source() {
        let server = MockServer::start_async().await;
        let active = batch();
        let runs = vec![
            completed_run(&active, DrobilkaType::Hard),
            completed_run(&active, DrobilkaType::Soft),
        ];

        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/totals");
                then.status(200)
                    .json_body(json!({ "hard_total": 3.0, "soft_total": 1.5 }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/batches/active");
                then.status(200).json_body(serde_json::to_value(&active).unwrap());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/recycling/drobilka");
                then.status(200).json_body(serde_json::to_value(&runs).unwrap());
            })
            .await;

        let source = std::sync::Arc::new(HttpWorkflowSource::new(&server.base_url()).unwrap());
        let config = PollerConfig::default().with_auto_refresh(false);
        let handle = WorkflowPoller::new(source, config).start();

        let view = handle.refresh_now().await.unwrap();
        let snapshot = view.snapshot.unwrap();
        assert!(snapshot.can_complete);
        assert!(snapshot.completion_blockers.is_empty());
        assert_eq!(snapshot.processes.len(), 2);
        assert_eq!(snapshot.totals.soft_total, 1.5);

        handle.stop().await;
    }
}
