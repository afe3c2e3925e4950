//! Observable sync events.

use crate::item::SyncItem;
use crate::network::Connectivity;
use crate::report::FlushSummary;

/// Event emitted by the sync service.
///
/// Events for items are only emitted after the pass results are persisted,
/// so an `ItemDropped` item is really gone from the stored queue.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connectivity changed.
    NetworkChanged { connectivity: Connectivity },
    /// An item reached the remote.
    ItemDelivered { item: SyncItem },
    /// An item failed and stays queued.
    ItemRetained { item: SyncItem, error: String },
    /// An item failed its last allowed attempt and was discarded.
    ItemDropped { item: SyncItem, error: String },
    /// A pass finished.
    FlushCompleted { summary: FlushSummary },
}
