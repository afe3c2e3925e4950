//! Sync service configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use offsync_common::{Error, Result};

/// Store key holding the serialized sync queue.
pub const DEFAULT_QUEUE_KEY: &str = "offline_sync_queue";
/// Store key holding the serialized offline cache.
pub const DEFAULT_CACHE_KEY: &str = "offline_data";
/// Failed attempts tolerated before an item is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for the offline sync service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of failed delivery attempts per item.
    pub max_retries: u32,
    /// Store key for the queue blob.
    pub queue_key: String,
    /// Store key for the cache blob.
    pub cache_key: String,
    /// Upper bound for a single remote call, in milliseconds.
    pub item_timeout_ms: Option<u64>,
    /// Buffered events per subscriber before the slowest one lags.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            item_timeout_ms: None,
            event_capacity: 64,
        }
    }
}

impl SyncConfig {
    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Bound every remote call by `timeout`.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Per-call timeout, if any.
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    /// Check the configuration for values the service cannot run with.
    ///
    /// # Errors
    /// - `max_retries` or `event_capacity` is zero
    /// - a store key is empty, or both keys are the same
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        if self.queue_key.is_empty() || self.cache_key.is_empty() {
            return Err(Error::Config("store keys cannot be empty".to_string()));
        }
        if self.queue_key == self.cache_key {
            return Err(Error::Config(
                "queue_key and cache_key must differ".to_string(),
            ));
        }
        if self.item_timeout_ms == Some(0) {
            return Err(Error::Config("item_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.queue_key, "offline_sync_queue");
        assert_eq!(config.cache_key, "offline_data");
        assert!(config.item_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SyncConfig::from_json(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.queue_key, DEFAULT_QUEUE_KEY);
    }

    #[test]
    fn test_item_timeout() {
        let config = SyncConfig::default().with_item_timeout(Duration::from_secs(2));
        assert_eq!(config.item_timeout_ms, Some(2000));
        assert_eq!(config.item_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(SyncConfig::default().with_max_retries(0).validate().is_err());

        let mut same_keys = SyncConfig::default();
        same_keys.cache_key = same_keys.queue_key.clone();
        assert!(same_keys.validate().is_err());

        let mut no_capacity = SyncConfig::default();
        no_capacity.event_capacity = 0;
        assert!(no_capacity.validate().is_err());
    }
}
