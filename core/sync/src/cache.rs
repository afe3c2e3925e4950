//! Last-known-good values for reading while offline.

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use offsync_common::{Error, Result};
use offsync_storage::{KeyValueStore, KeyValueStoreExt};

/// A cached value and when it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The cached value. Entries stored without one read as `null`.
    #[serde(default)]
    pub data: Value,
    /// When the value was cached.
    #[serde(alias = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

type CacheMap = BTreeMap<String, CacheEntry>;

/// Offline cache persisted as a single map record.
///
/// Independent of the sync queue; the two only share a store.
pub struct OfflineCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    lock: Mutex<()>,
}

impl OfflineCache {
    /// Create a cache over `store`, persisted under `key`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lock: Mutex::new(()),
        }
    }

    /// Cache `value` under `key`, replacing any previous entry.
    pub async fn put<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_value(value).map_err(|e| Error::Serialization(e.to_string()))?;

        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                cached_at: Utc::now().trunc_subsecs(3),
            },
        );
        debug!("Cached offline value for {}", key);
        self.save(&entries)
            .await
            .inspect_err(|e| error!("Error storing offline data: {}", e))
    }

    /// Get the cached value for `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entry(key).await?.map(|entry| entry.data))
    }

    /// Get and decode the cached value for `key`.
    ///
    /// # Errors
    /// - The cached value does not decode as `T`
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(data) => serde_json::from_value(data)
                .map(Some)
                .map_err(|e| Error::Serialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Get the full entry, including when it was cached.
    pub async fn entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.load().await?.remove(key))
    }

    /// All cached entries, ordered by key.
    pub async fn entries(&self) -> Result<BTreeMap<String, CacheEntry>> {
        self.load().await
    }

    /// Remove the entry for `key`. Missing keys are ignored.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries)
            .await
            .inspect_err(|e| error!("Error removing offline item: {}", e))
    }

    /// Drop every cached entry.
    pub async fn clear_all(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store
            .remove_item(&self.key)
            .await
            .inspect_err(|e| error!("Error clearing offline data: {}", e))
    }

    async fn load(&self) -> Result<CacheMap> {
        let entries: Option<CacheMap> = self
            .store
            .get_json(&self.key)
            .await
            .inspect_err(|e| error!("Error getting offline data: {}", e))?;
        Ok(entries.unwrap_or_default())
    }

    async fn save(&self, entries: &CacheMap) -> Result<()> {
        self.store.set_json(&self.key, entries).await
    }
}
