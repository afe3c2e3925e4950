//! Count-based retry budget for queued items.

use crate::item::SyncItem;

/// What to do with an item after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep the item for a later pass.
    Retain,
    /// The budget is spent; remove the item.
    Drop,
}

/// Retry budget applied after every failed delivery.
///
/// There is no delay between attempts: a retained item waits for the next
/// pass, which only happens on reconnect or an explicit flush.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    /// Create a policy allowing `max_retries` failed attempts per item.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Record a failure on `item` and decide whether it stays queued.
    pub fn record_failure(&self, item: &mut SyncItem) -> RetryDecision {
        if item.record_failure() < self.max_retries {
            RetryDecision::Retain
        } else {
            RetryDecision::Drop
        }
    }

    /// Attempts left before `item` is dropped.
    pub fn remaining(&self, item: &SyncItem) -> u32 {
        self.max_retries.saturating_sub(item.retry_count)
    }

    /// Get the configured budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::MutationKind;

    #[test]
    fn test_budget_of_three() {
        let policy = RetryPolicy::default();
        let mut item = SyncItem::new(MutationKind::Delete, "/items/1", None);

        assert_eq!(policy.record_failure(&mut item), RetryDecision::Retain);
        assert_eq!(policy.record_failure(&mut item), RetryDecision::Retain);
        assert_eq!(policy.remaining(&item), 1);
        assert_eq!(policy.record_failure(&mut item), RetryDecision::Drop);
        assert_eq!(item.retry_count, 3);
        assert_eq!(policy.remaining(&item), 0);
    }

    #[test]
    fn test_single_attempt_budget() {
        let policy = RetryPolicy::new(1);
        let mut item = SyncItem::new(MutationKind::Create, "/items", None);
        assert_eq!(policy.record_failure(&mut item), RetryDecision::Drop);
    }

    #[test]
    fn test_item_over_budget_is_dropped() {
        // Budget lowered between runs: a stored count above it still drops.
        let policy = RetryPolicy::new(2);
        let mut item = SyncItem::new(MutationKind::Update, "/items/1", None);
        item.retry_count = 5;
        assert_eq!(policy.record_failure(&mut item), RetryDecision::Drop);
    }
}
