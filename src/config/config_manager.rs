// ==========================================
// Scrap Recycling - Config Manager
// ==========================================
// Storage: config_kv table (key-value + scope), global scope only
// Missing or malformed values fall back to defaults with a warning
// ==========================================

use crate::config::poller_config::PollerConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Build on an existing connection (PRAGMAs are re-applied, idempotent)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| format!("lock acquisition failed: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        Ok(conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![GLOBAL_SCOPE, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Insert or overwrite a global value
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err("config key must not be empty".into());
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
            params![GLOBAL_SCOPE, key, value],
        )?;

        tracing::info!(config_key = key, value, "config value updated");
        Ok(())
    }

    /// All global values as a JSON object string, keys sorted
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![GLOBAL_SCOPE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== scrap intake =====

    pub fn get_default_scrap_unit(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::DEFAULT_SCRAP_UNIT, "kg")?;
        let value = value.trim();
        if value.is_empty() {
            Ok("kg".to_string())
        } else {
            Ok(value.to_string())
        }
    }

    fn parse_or_warn<T: std::str::FromStr + std::fmt::Display + Copy>(
        key: &str,
        raw: &str,
        default: T,
    ) -> T {
        raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = key,
                raw_value = %raw,
                default = %default,
                "malformed config value, using default"
            );
            default
        })
    }
}

// ==========================================
// PollerConfigReader
// ==========================================
#[async_trait]
impl PollerConfigReader for ConfigManager {
    async fn get_poll_interval_secs(&self) -> ConfigResult<u64> {
        let value = self.get_config_or_default(config_keys::POLL_INTERVAL_SECS, "30")?;
        let secs = Self::parse_or_warn(config_keys::POLL_INTERVAL_SECS, &value, 30u64);
        Ok(secs.max(1))
    }

    async fn get_poll_auto_refresh(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::POLL_AUTO_REFRESH, "true")?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => {
                tracing::warn!(
                    config_key = config_keys::POLL_AUTO_REFRESH,
                    raw_value = %value,
                    "malformed config value, using default"
                );
                Ok(true)
            }
        }
    }

    async fn get_poll_max_backoff_secs(&self) -> ConfigResult<u64> {
        let value = self.get_config_or_default(config_keys::POLL_MAX_BACKOFF_SECS, "300")?;
        let secs = Self::parse_or_warn(config_keys::POLL_MAX_BACKOFF_SECS, &value, 300u64);
        Ok(secs.max(1))
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // poller
    pub const POLL_INTERVAL_SECS: &str = "poll_interval_secs";
    pub const POLL_AUTO_REFRESH: &str = "poll_auto_refresh";
    pub const POLL_MAX_BACKOFF_SECS: &str = "poll_max_backoff_secs";

    // scrap intake
    pub const DEFAULT_SCRAP_UNIT: &str = "default_scrap_unit";
}
