//! Key-value store trait definition.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use offsync_common::{Error, Result};

/// Durable string storage that survives process restarts.
///
/// Implementations must make `set_item` durable before returning, so a
/// caller that awaited the write can rely on it after a restart.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Read the value stored under `key`.
    ///
    /// # Returns
    /// `None` when nothing is stored under the key.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Postconditions
    /// - A following `get_item(key)` returns `Some(value)`
    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Remove the value stored under `key`.
    ///
    /// Removing a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// List every stored key, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Remove every stored key.
    async fn clear(&self) -> Result<()>;
}

/// Typed helpers layered over any [`KeyValueStore`].
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Check whether a value is stored under `key`.
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key).await?.is_some())
    }

    /// Read and decode a JSON value.
    ///
    /// A blank stored string is treated the same as a missing key.
    ///
    /// # Errors
    /// - The stored text is not valid JSON for `T`
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_item(key).await? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::Serialization(format!("{}: {}", key, e))),
            _ => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it under `key`.
    async fn set_json<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.set_item(key, json).await
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}
