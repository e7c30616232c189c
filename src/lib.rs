// ==========================================
// Scrap Recycling - Core Library
// ==========================================
// Batch lifecycle, drobilka lines and completion gating over SQLite.
// The operator stays in control: the system only accepts or refuses
// commands and always says why.
// ==========================================

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and enums
pub mod domain;

// Repository layer - data access
pub mod repository;

// Engine layer - workflow rules
pub mod engine;

// Configuration layer
pub mod config;

// Database infrastructure (connection setup, PRAGMAs, schema)
pub mod db;

// Logging
pub mod logging;

// API layer
pub mod api;

// Poller - periodic view resync
pub mod poller;

// Application layer - service wiring
pub mod app;

// ==========================================
// Re-exports
// ==========================================

// Domain types
pub use domain::types::{BatchStatus, DrobilkaType, ScrapClass, ScrapStatus};

// Domain entities
pub use domain::{
    ActionLog, ActionType, DrobilkaProcess, Recycling, RecyclingBatch, ScrapRecord, ScrapTotals,
};

// Engine
pub use engine::{
    CompletionGate, DrobilkaProcessTracker, RecyclingBatchManager, ScrapLedger, WorkflowError,
};

// API
pub use api::{ApiError, ApiResult, RecyclingApi, WorkflowSnapshot};

// Poller
pub use poller::{PollerHandle, WorkflowPoller, WorkflowView};

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Scrap Recycling Workflow";
