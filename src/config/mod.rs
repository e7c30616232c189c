// ==========================================
// Scrap Recycling - Configuration Layer
// ==========================================
// Storage: config_kv table
// ==========================================

pub mod config_manager;
pub mod poller_config;

// Re-exports
pub use config_manager::{config_keys, ConfigManager, ConfigResult};
pub use poller_config::{PollerConfig, PollerConfigReader};
