// ==========================================
// Scrap Recycling - API Layer
// ==========================================
// Responsibility: request validation and error translation for callers
// ==========================================

pub mod error;
pub mod recycling_api;

// Re-exports
pub use error::{ApiError, ApiResult, ErrorPayload};
pub use recycling_api::{
    CompleteBatchRequest, RecyclingApi, ReportScrapRequest, StartProcessRequest,
    WorkflowSnapshot,
};
