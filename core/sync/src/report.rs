//! Results of sync passes.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::item::SyncItem;

/// What happened to one item during a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// The remote accepted the mutation; the item left the queue.
    Delivered,
    /// Delivery failed; the item stays queued for a later pass.
    Retained { error: String },
    /// Delivery failed and the retry budget is spent; the item was removed.
    Dropped { error: String },
}

/// Outcome of one item, with its state after the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    pub item: SyncItem,
    pub outcome: ItemOutcome,
}

/// Counts for a completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub delivered: usize,
    pub retained: usize,
    pub dropped: usize,
    /// Items left in the queue after the pass, including ones queued meanwhile.
    pub remaining: usize,
    pub duration: Duration,
}

/// Per-item results of a completed pass, in delivery order.
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub records: Vec<DeliveryRecord>,
    pub remaining: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl FlushReport {
    /// Number of delivered items.
    pub fn delivered(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Delivered))
    }

    /// Number of items kept for a later pass.
    pub fn retained(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Retained { .. }))
    }

    /// Number of items dropped after exhausting their retries.
    pub fn dropped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Dropped { .. }))
    }

    /// Items dropped during this pass.
    pub fn dropped_items(&self) -> impl Iterator<Item = &SyncItem> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Dropped { .. }))
            .map(|r| &r.item)
    }

    /// Counts for this pass.
    pub fn summary(&self) -> FlushSummary {
        FlushSummary {
            delivered: self.delivered(),
            retained: self.retained(),
            dropped: self.dropped(),
            remaining: self.remaining,
            duration: self.duration,
        }
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Result of a call to flush.
#[derive(Debug, Clone)]
pub enum FlushOutcome {
    /// The device is offline; nothing was attempted.
    Offline,
    /// Another pass is in flight; nothing was attempted.
    AlreadyRunning,
    /// A pass ran over the queue.
    Completed(FlushReport),
}

impl FlushOutcome {
    /// The pass report, if a pass ran.
    pub fn report(&self) -> Option<&FlushReport> {
        match self {
            FlushOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    /// Whether the call returned without attempting delivery.
    pub fn is_skipped(&self) -> bool {
        !matches!(self, FlushOutcome::Completed(_))
    }
}
