// ==========================================
// Scrap Recycling - Workflow Poller
// ==========================================
// Read-only observer: never mutates workflow state, only replaces its
// view from a full re-fetch
// ==========================================

pub mod source;
pub mod view;
pub mod workflow_poller;

// Re-exports
pub use source::{HttpWorkflowSource, LocalWorkflowSource, WorkflowSource};
pub use view::WorkflowView;
pub use workflow_poller::{PollerHandle, WorkflowPoller};
