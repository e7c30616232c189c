// ==========================================
// Scrap Recycling - Poller Configuration
// ==========================================
// Read interface for the workflow poller settings, plus the resolved value
// object the poller is started with.
// Rule: read-only, no config writes here
// ==========================================

use crate::config::config_manager::ConfigResult;
use async_trait::async_trait;
use std::time::Duration;

// ==========================================
// PollerConfigReader Trait
// ==========================================
// Implemented by ConfigManager (config_kv table)
#[async_trait]
pub trait PollerConfigReader: Send + Sync {
    /// Seconds between refreshes
    ///
    /// # Default
    /// - 30 (never below 1)
    async fn get_poll_interval_secs(&self) -> ConfigResult<u64>;

    /// Whether the periodic tick is on at startup
    ///
    /// # Default
    /// - true
    async fn get_poll_auto_refresh(&self) -> ConfigResult<bool>;

    /// Upper bound of the error backoff delay
    ///
    /// # Default
    /// - 300
    async fn get_poll_max_backoff_secs(&self) -> ConfigResult<u64>;
}

// ==========================================
// PollerConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub auto_refresh: bool,
    pub max_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            auto_refresh: true,
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl PollerConfig {
    pub async fn load(reader: &dyn PollerConfigReader) -> ConfigResult<Self> {
        Ok(Self {
            interval: Duration::from_secs(reader.get_poll_interval_secs().await?),
            auto_refresh: reader.get_poll_auto_refresh().await?,
            max_backoff: Duration::from_secs(reader.get_poll_max_backoff_secs().await?),
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader;

    #[async_trait]
    impl PollerConfigReader for FixedReader {
        async fn get_poll_interval_secs(&self) -> ConfigResult<u64> {
            Ok(12)
        }
        async fn get_poll_auto_refresh(&self) -> ConfigResult<bool> {
            Ok(false)
        }
        async fn get_poll_max_backoff_secs(&self) -> ConfigResult<u64> {
            Ok(60)
        }
    }

    #[tokio::test]
    async fn test_load_from_reader() {
        let config = PollerConfig::load(&FixedReader).await.unwrap();
        assert_eq!(config.interval, Duration::from_secs(12));
        assert!(!config.auto_refresh);
        assert_eq!(config.max_backoff, Duration::from_secs(60));
    }

    #[test]
    fn test_default_values() {
        let config = PollerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert!(config.auto_refresh);
        assert_eq!(config.max_backoff, Duration::from_secs(300));
    }
}
