// ==========================================
// Scrap Recycling - Application Layer
// ==========================================
// Responsibility: service wiring for the binary and integration tests
// ==========================================

pub mod state;

// Re-exports
pub use state::{get_default_db_path, AppState};
