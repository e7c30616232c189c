// ==========================================
// Scrap Recycling - Domain Layer
// ==========================================
// Responsibility: entities and enums of the recycling workflow
// Rule: no data access, no workflow policy
// ==========================================

pub mod action_log;
pub mod batch;
pub mod drobilka;
pub mod recycling;
pub mod scrap;
pub mod types;

// Re-exports
pub use action_log::{ActionLog, ActionType};
pub use batch::RecyclingBatch;
pub use drobilka::DrobilkaProcess;
pub use recycling::Recycling;
pub use scrap::{ScrapRecord, ScrapTotals};
pub use types::{BatchStatus, DrobilkaType, ScrapClass, ScrapStatus};
