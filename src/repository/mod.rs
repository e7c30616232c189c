// ==========================================
// Scrap Recycling - Repository Layer
// ==========================================
// Rule: repositories hold no workflow policy
// Rule: all queries are parameterized
// ==========================================
// Every repository shares one Arc<Mutex<Connection>>.
// ==========================================

pub mod action_log_repo;
pub mod batch_repo;
pub mod drobilka_repo;
pub mod error;
pub mod recycling_repo;
pub mod row_utils;
pub mod scrap_repo;

// Re-exports
pub use action_log_repo::ActionLogRepository;
pub use batch_repo::{BatchCompletion, RecyclingBatchRepository};
pub use drobilka_repo::DrobilkaProcessRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use recycling_repo::RecyclingRepository;
pub use scrap_repo::ScrapRecordRepository;
