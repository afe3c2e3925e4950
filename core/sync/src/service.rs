//! Offline sync service that queues mutations and replays them on reconnect.

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use offsync_common::{Error, Result};
use offsync_storage::KeyValueStore;

use crate::cache::{CacheEntry, OfflineCache};
use crate::config::SyncConfig;
use crate::event::SyncEvent;
use crate::item::{MutationKind, SyncItem};
use crate::network::{Connectivity, NetworkMonitor};
use crate::queue::{PassUpdate, SyncQueue};
use crate::remote::{RemoteApi, RemoteResponse};
use crate::report::{DeliveryRecord, FlushOutcome, FlushReport, ItemOutcome};
use crate::retry::{RetryDecision, RetryPolicy};

/// Buffers local mutations and delivers them to the remote API once the
/// device is online.
///
/// Construct one per application and share it as `Arc`. Delivery is
/// at-least-once: an item is only removed from the stored queue after the
/// pass that delivered it has been persisted.
pub struct OfflineSyncService {
    /// Pending mutations.
    queue: SyncQueue,
    /// Last-known-good values.
    cache: OfflineCache,
    /// Backend the queue delivers to.
    remote: Arc<dyn RemoteApi>,
    /// Connectivity source.
    network: Arc<dyn NetworkMonitor>,
    /// Retry budget per item.
    retry_policy: RetryPolicy,
    /// Configuration.
    config: SyncConfig,
    /// Last known connectivity.
    online: AtomicBool,
    /// Set while a pass is running.
    flushing: AtomicBool,
    initialized: AtomicBool,
    /// Network listener task.
    listener: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl OfflineSyncService {
    /// Create a new sync service.
    ///
    /// The service assumes it is online until [`initialize`](Self::initialize)
    /// reads the real state.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApi>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            queue: SyncQueue::new(store.clone(), config.queue_key.clone()),
            cache: OfflineCache::new(store, config.cache_key.clone()),
            remote,
            network,
            retry_policy: RetryPolicy::new(config.max_retries),
            config,
            online: AtomicBool::new(true),
            flushing: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            listener: Mutex::new(None),
            events,
        })
    }

    /// Read the current connectivity and start listening for changes.
    ///
    /// Every offline→online transition spawns a flush. Calling this again
    /// while initialized is a no-op.
    ///
    /// # Errors
    /// - The network monitor cannot report the current state
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            warn!("Offline sync already initialized, ignoring");
            return Ok(());
        }

        let mut changes = self.network.subscribe();

        let connectivity = match self.network.current().await {
            Ok(connectivity) => connectivity,
            Err(e) => {
                error!("Failed to read network state: {}", e);
                self.initialized.store(false, Ordering::Release);
                return Err(e);
            }
        };
        self.online.store(connectivity.is_online(), Ordering::Release);
        info!("Offline sync initialized ({:?})", connectivity);

        // The listener only holds a weak handle so dropping the service ends it
        let service = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(connectivity) = changes.recv().await {
                match service.upgrade() {
                    Some(service) => service.handle_connectivity(connectivity),
                    None => break,
                }
            }
            debug!("Network listener stopped");
        });

        if let Ok(mut listener) = self.listener.lock() {
            *listener = Some(handle);
        }
        Ok(())
    }

    /// Stop listening for network changes.
    ///
    /// The service keeps working; flushes must then be triggered explicitly.
    pub fn shutdown(&self) {
        let handle = self.listener.lock().ok().and_then(|mut l| l.take());
        if let Some(handle) = handle {
            handle.abort();
            info!("Offline sync network listener stopped");
        }
        self.initialized.store(false, Ordering::Release);
    }

    fn handle_connectivity(self: &Arc<Self>, connectivity: Connectivity) {
        let now_online = connectivity.is_online();
        let was_online = self.online.swap(now_online, Ordering::AcqRel);

        if was_online == now_online {
            return;
        }

        info!("Network changed: {:?}", connectivity);
        self.emit(SyncEvent::NetworkChanged { connectivity });

        if now_online {
            // Not awaited; the listener keeps draining changes
            let service = Arc::clone(self);
            tokio::spawn(async move {
                match service.flush().await {
                    Ok(outcome) => debug!("Reconnect flush finished: {:?}", outcome.report().map(|r| r.summary())),
                    Err(e) => error!("Reconnect flush failed: {}", e),
                }
            });
        }
    }

    /// Queue a mutation for delivery.
    ///
    /// Returns once the whole queue, including the new item, is persisted.
    /// No delivery is attempted.
    pub async fn enqueue(
        &self,
        kind: MutationKind,
        target: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<SyncItem> {
        let item = SyncItem::new(kind, target, payload);
        self.queue
            .push(item.clone())
            .await
            .inspect_err(|e| error!("Error adding to sync queue: {}", e))?;
        Ok(item)
    }

    /// Queue creation of a resource.
    pub async fn create(&self, target: impl Into<String>, payload: Value) -> Result<SyncItem> {
        self.enqueue(MutationKind::Create, target, Some(payload)).await
    }

    /// Queue an update of a resource.
    pub async fn update(&self, target: impl Into<String>, payload: Value) -> Result<SyncItem> {
        self.enqueue(MutationKind::Update, target, Some(payload)).await
    }

    /// Queue deletion of a resource.
    pub async fn delete(&self, target: impl Into<String>) -> Result<SyncItem> {
        self.enqueue(MutationKind::Delete, target, None).await
    }

    /// Attempt delivery of every queued item, in enqueue order.
    ///
    /// Returns immediately without touching the queue when offline or when
    /// another pass is running. A failed item does not stop the pass; its
    /// retry count goes up and it is dropped once the budget is spent. The
    /// queue is written once, after every item was attempted.
    ///
    /// # Errors
    /// - The queue cannot be read or the pass results cannot be persisted.
    ///   The stored queue is then left as it was, so delivered items will be
    ///   sent again by a later pass.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        if !self.is_online() {
            debug!("Offline, skipping sync");
            return Ok(FlushOutcome::Offline);
        }

        if self
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in progress, skipping");
            return Ok(FlushOutcome::AlreadyRunning);
        }
        let _guard = FlushGuard(&self.flushing);

        let report = self
            .run_pass()
            .await
            .inspect_err(|e| error!("Error syncing pending items: {}", e))?;
        Ok(FlushOutcome::Completed(report))
    }

    async fn run_pass(&self) -> Result<FlushReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let items = self.queue.load().await?;
        if !items.is_empty() {
            info!("Syncing {} pending items", items.len());
        }

        let mut update = PassUpdate::new();
        let mut records = Vec::with_capacity(items.len());

        for mut item in items {
            let outcome = match self.deliver(&item).await {
                Ok(response) => {
                    debug!("Delivered {} {} ({})", item.kind, item.target, response.status);
                    update.finish(item.id.clone());
                    ItemOutcome::Delivered
                }
                Err(err) => {
                    let error = err.to_string();
                    match self.retry_policy.record_failure(&mut item) {
                        RetryDecision::Retain => {
                            warn!(
                                "Failed to sync item {} (attempt {}/{}, transient: {}): {}",
                                item.id,
                                item.retry_count,
                                self.retry_policy.max_retries(),
                                err.is_transient(),
                                err
                            );
                            update.retain(item.clone());
                            ItemOutcome::Retained { error }
                        }
                        RetryDecision::Drop => {
                            error!(
                                "Dropping item {} ({} {}) after {} failed attempts: {}",
                                item.id, item.kind, item.target, item.retry_count, err
                            );
                            update.finish(item.id.clone());
                            ItemOutcome::Dropped { error }
                        }
                    }
                }
            };
            records.push(DeliveryRecord { item, outcome });
        }

        let remaining = if update.is_empty() {
            self.queue.len().await?
        } else {
            self.queue.apply(update).await?
        };

        let report = FlushReport {
            records,
            remaining,
            started_at,
            duration: start.elapsed(),
        };

        for record in &report.records {
            let item = record.item.clone();
            self.emit(match &record.outcome {
                ItemOutcome::Delivered => SyncEvent::ItemDelivered { item },
                ItemOutcome::Retained { error } => SyncEvent::ItemRetained {
                    item,
                    error: error.clone(),
                },
                ItemOutcome::Dropped { error } => SyncEvent::ItemDropped {
                    item,
                    error: error.clone(),
                },
            });
        }

        let summary = report.summary();
        if !report.records.is_empty() {
            info!(
                "Sync pass completed in {:?}: {} delivered, {} retained, {} dropped, {} remaining",
                summary.duration, summary.delivered, summary.retained, summary.dropped, summary.remaining
            );
        }
        self.emit(SyncEvent::FlushCompleted { summary });

        Ok(report)
    }

    /// Send one item with the remote call matching its kind.
    async fn deliver(&self, item: &SyncItem) -> Result<RemoteResponse> {
        let call = async {
            match item.kind {
                MutationKind::Create => self.remote.post(&item.target, item.payload.as_ref()).await,
                MutationKind::Update => self.remote.put(&item.target, item.payload.as_ref()).await,
                MutationKind::Delete => self.remote.delete(&item.target).await,
            }
        };

        match self.config.item_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::Timeout(limit.as_millis() as u64))?,
            None => call.await,
        }
    }

    /// Number of items waiting for delivery.
    pub async fn queue_len(&self) -> Result<usize> {
        self.queue.len().await
    }

    /// Snapshot of the queue in delivery order.
    pub async fn pending_items(&self) -> Result<Vec<SyncItem>> {
        self.queue.load().await
    }

    /// Discard every queued item without delivering it.
    pub async fn clear_queue(&self) -> Result<()> {
        self.queue.clear().await?;
        info!("Sync queue cleared");
        Ok(())
    }

    /// The offline cache sharing this service's store.
    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    /// Every cached value with its timestamp.
    pub async fn cache_entries(&self) -> Result<BTreeMap<String, CacheEntry>> {
        self.cache.entries().await
    }

    /// Last known connectivity.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Whether a pass is running.
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Receive sync events, including dropped items.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Drop for OfflineSyncService {
    fn drop(&mut self) {
        if let Ok(listener) = self.listener.get_mut() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

/// Clears the in-progress flag when a pass ends, even if it was cancelled.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
