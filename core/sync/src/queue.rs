//! Durable FIFO queue of pending mutations.
//!
//! The whole queue lives in a single store record. Every mutation is a full
//! read-modify-write of that record, serialized by an async lock, so the
//! persisted value is always a complete snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use offsync_common::{ItemId, Result};
use offsync_storage::{KeyValueStore, KeyValueStoreExt};

use crate::item::SyncItem;

/// Result of one sync pass, applied to the stored queue in a single write.
#[derive(Debug, Default)]
pub struct PassUpdate {
    /// Items delivered or dropped during the pass.
    finished: HashSet<ItemId>,
    /// Items that failed and stay queued, with their new retry count.
    retained: HashMap<ItemId, SyncItem>,
}

impl PassUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an item as delivered or dropped.
    pub fn finish(&mut self, id: ItemId) {
        self.retained.remove(&id);
        self.finished.insert(id);
    }

    /// Keep an item queued with its updated state.
    pub fn retain(&mut self, item: SyncItem) {
        self.finished.remove(&item.id);
        self.retained.insert(item.id.clone(), item);
    }

    /// Check if the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.finished.is_empty() && self.retained.is_empty()
    }
}

/// Sync queue persisted in a key-value store.
pub struct SyncQueue {
    /// Backing store.
    store: Arc<dyn KeyValueStore>,
    /// Record holding the serialized queue.
    key: String,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl SyncQueue {
    /// Create a queue over `store`, persisted under `key`.
    ///
    /// Nothing is read until the first operation; a missing record is an
    /// empty queue.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lock: Mutex::new(()),
        }
    }

    /// Load the current queue in enqueue order.
    ///
    /// # Errors
    /// - Store read fails
    /// - Stored record is not a valid queue
    pub async fn load(&self) -> Result<Vec<SyncItem>> {
        let items: Option<Vec<SyncItem>> = self
            .store
            .get_json(&self.key)
            .await
            .inspect_err(|e| error!("Error getting sync queue: {}", e))?;
        Ok(items.unwrap_or_default())
    }

    /// Number of queued items.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    /// Check if the queue is empty.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Append an item and persist the whole queue.
    pub async fn push(&self, item: SyncItem) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut items = self.load().await?;
        debug!("Queueing {} {} as {}", item.kind, item.target, item.id);
        items.push(item);
        self.save(&items).await
    }

    /// Apply the results of a sync pass.
    ///
    /// Finished items are removed and retained items replaced in place.
    /// Items queued while the pass ran keep their position, and items no
    /// longer stored (the queue was cleared meanwhile) are not re-added.
    ///
    /// # Returns
    /// Number of items left in the queue.
    pub async fn apply(&self, update: PassUpdate) -> Result<usize> {
        let _guard = self.lock.lock().await;

        let PassUpdate {
            finished,
            mut retained,
        } = update;

        let surviving: Vec<SyncItem> = self
            .load()
            .await?
            .into_iter()
            .filter(|item| !finished.contains(&item.id))
            .map(|item| retained.remove(&item.id).unwrap_or(item))
            .collect();

        self.save(&surviving).await?;
        Ok(surviving.len())
    }

    /// Remove every queued item.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;

        self.store
            .remove_item(&self.key)
            .await
            .inspect_err(|e| error!("Error clearing sync queue: {}", e))
    }

    async fn save(&self, items: &[SyncItem]) -> Result<()> {
        self.store
            .set_json(&self.key, &items)
            .await
            .inspect_err(|e| error!("Error persisting sync queue: {}", e))
    }
}
