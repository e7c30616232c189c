// ==========================================
// Scrap Recycling - Workflow Sources
// ==========================================
// Where the poller reads the system of record from: the local database
// (through RecyclingApi) or a remote console backend over HTTP.
// Every HTTP failure (transport, status, decode) is TransientIo.
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::recycling_api::RecyclingApi;
use crate::domain::batch::RecyclingBatch;
use crate::domain::drobilka::DrobilkaProcess;
use crate::domain::scrap::ScrapTotals;

/// Default HTTP timeout for one request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ==========================================
// WorkflowSource Trait
// ==========================================
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn current_totals(&self) -> ApiResult<ScrapTotals>;

    async fn active_batch(&self) -> ApiResult<Option<RecyclingBatch>>;

    async fn list_processes(&self, batch_id: &str) -> ApiResult<Vec<DrobilkaProcess>>;
}

// ==========================================
// LocalWorkflowSource
// ==========================================

/// Reads straight from the local database
///
/// SQLite calls block, so each read runs on the blocking pool.
pub struct LocalWorkflowSource {
    api: Arc<RecyclingApi>,
}

impl LocalWorkflowSource {
    pub fn new(api: Arc<RecyclingApi>) -> Self {
        Self { api }
    }

    async fn run_blocking<T, F>(&self, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecyclingApi) -> ApiResult<T> + Send + 'static,
    {
        let api = self.api.clone();
        tokio::task::spawn_blocking(move || f(&api))
            .await
            .map_err(|e| ApiError::InternalError(format!("blocking read panicked: {}", e)))?
    }
}

#[async_trait]
impl WorkflowSource for LocalWorkflowSource {
    async fn current_totals(&self) -> ApiResult<ScrapTotals> {
        self.run_blocking(|api| api.get_current_totals()).await
    }

    async fn active_batch(&self) -> ApiResult<Option<RecyclingBatch>> {
        self.run_blocking(|api| api.get_active_batch()).await
    }

    async fn list_processes(&self, batch_id: &str) -> ApiResult<Vec<DrobilkaProcess>> {
        let batch_id = batch_id.to_string();
        self.run_blocking(move |api| api.list_drobilka_processes(Some(&batch_id)))
            .await
    }
}

// ==========================================
// HttpWorkflowSource
// ==========================================

/// Totals as served by the console backend
///
/// Accepts both the snake_case and the camelCase field names.
#[derive(Debug, Deserialize)]
struct TotalsWire {
    #[serde(alias = "hardScrap", alias = "hard_scrap")]
    hard_total: f64,
    #[serde(alias = "softScrap", alias = "soft_scrap")]
    soft_total: f64,
}

/// Reads a remote console backend over JSON/HTTP
pub struct HttpWorkflowSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpWorkflowSource {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::InvalidInput("base url must not be empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        self.http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::TransientIo(format!("GET {} failed: {}", url, e)))
    }

    async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::TransientIo(format!(
                "GET {} returned HTTP {}",
                path, status
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::TransientIo(format!("GET {} returned bad JSON: {}", path, e)))
    }
}

#[async_trait]
impl WorkflowSource for HttpWorkflowSource {
    async fn current_totals(&self) -> ApiResult<ScrapTotals> {
        let path = "/recycling/totals";
        let response = self.fetch(path, &[]).await?;
        let wire: TotalsWire = Self::decode(path, response).await?;
        Ok(ScrapTotals {
            hard_total: wire.hard_total,
            soft_total: wire.soft_total,
        })
    }

    async fn active_batch(&self) -> ApiResult<Option<RecyclingBatch>> {
        let path = "/recycling/batches/active";
        let response = self.fetch(path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(path, response).await
    }

    async fn list_processes(&self, batch_id: &str) -> ApiResult<Vec<DrobilkaProcess>> {
        let path = "/recycling/drobilka";
        let response = self.fetch(path, &[("batch_id", batch_id)]).await?;
        Self::decode(path, response).await
    }
}
