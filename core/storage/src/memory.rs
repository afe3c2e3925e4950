//! In-memory key-value store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use offsync_common::{Error, Result};
use crate::store::KeyValueStore;

/// In-memory key-value store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Clones share the same underlying map, so a test can
/// keep a handle and inspect what a service persisted.
#[derive(Clone, Default)]
pub struct MemoryStore {
    storage: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.storage
            .read()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.storage
            .write()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.write()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get() {
        let store = MemoryStore::new();

        store.set_item("token", "abc".to_string()).await.unwrap();
        let value = store.get_item("token").await.unwrap();

        assert_eq!(value.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::new();
        assert!(store.get_item("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = MemoryStore::new();

        store.set_item("k", "one".to_string()).await.unwrap();
        store.set_item("k", "two".to_string()).await.unwrap();

        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();

        store.set_item("k", "v".to_string()).await.unwrap();
        store.remove_item("k").await.unwrap();
        assert!(store.get_item("k").await.unwrap().is_none());

        // Removing again is not an error
        store.remove_item("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.set_item("shared", "yes".to_string()).await.unwrap();

        assert_eq!(handle.get_item("shared").await.unwrap().as_deref(), Some("yes"));
    }

    #[tokio::test]
    async fn test_keys_and_clear() {
        let store = MemoryStore::new();
        store.set_item("a", "1".to_string()).await.unwrap();
        store.set_item("b", "2".to_string()).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        store.clear().await.unwrap();
        assert!(store.is_empty());
    }
}
