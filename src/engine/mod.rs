// ==========================================
// Scrap Recycling - Engine Layer
// ==========================================
// Responsibility: workflow state machines and the completion gate
// Rule: the engine never builds SQL
// Rule: every refusal carries a human-readable reason
// ==========================================

pub mod batch_manager;
pub mod completion_gate;
pub mod drobilka_tracker;
pub mod error;
pub mod events;
pub mod ledger;
pub mod lock;
pub mod repositories;

// Re-exports
pub use batch_manager::RecyclingBatchManager;
pub use completion_gate::{CompletionGate, GateVerdict};
pub use drobilka_tracker::{DrobilkaProcessTracker, ProcessStart};
pub use error::{WorkflowError, WorkflowResult};
pub use events::{
    BroadcastEventPublisher, NoOpEventPublisher, OptionalEventPublisher, WorkflowEvent,
    WorkflowEventPublisher, WorkflowEventType,
};
pub use ledger::{ScrapLedger, ScrapReport};
pub use lock::WorkflowLock;
pub use repositories::WorkflowRepositories;
