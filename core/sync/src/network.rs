//! Network status observation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use offsync_common::Result;

/// Device connectivity as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connectivity {
    /// A network connection is available.
    Online,
    /// No network connection.
    Offline,
    /// The platform could not tell.
    Unknown,
}

impl Connectivity {
    /// Map a platform `isConnected` flag, where absent means unknown.
    pub fn from_connected(connected: Option<bool>) -> Self {
        match connected {
            Some(true) => Connectivity::Online,
            Some(false) => Connectivity::Offline,
            None => Connectivity::Unknown,
        }
    }

    /// Whether delivery should be attempted. Unknown counts as offline.
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// Source of connectivity state and transitions.
///
/// Dropping the receiver returned by [`subscribe`](Self::subscribe)
/// unsubscribes.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Query the present connectivity.
    async fn current(&self) -> Result<Connectivity>;

    /// Receive connectivity changes.
    ///
    /// Every reported state is delivered in order, so a short offline period
    /// is seen even when the receiver only runs after the device is back.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Connectivity>;
}

/// Network monitor driven by explicit calls.
///
/// Used by tests and by hosts that learn about connectivity from their own
/// platform callbacks and forward it here.
#[derive(Debug)]
pub struct ManualNetwork {
    inner: Mutex<ManualNetworkInner>,
}

#[derive(Debug)]
struct ManualNetworkInner {
    current: Connectivity,
    subscribers: Vec<mpsc::UnboundedSender<Connectivity>>,
}

impl ManualNetwork {
    /// Create a monitor starting in `initial` state.
    pub fn new(initial: Connectivity) -> Self {
        Self {
            inner: Mutex::new(ManualNetworkInner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Report a new connectivity state to every subscriber.
    pub fn set(&self, connectivity: Connectivity) {
        let mut inner = self.lock();
        inner.current = connectivity;
        // Closed receivers are pruned here
        inner.subscribers.retain(|tx| tx.send(connectivity).is_ok());
    }

    /// Report that the device is online.
    pub fn go_online(&self) {
        self.set(Connectivity::Online);
    }

    /// Report that the device is offline.
    pub fn go_offline(&self) {
        self.set(Connectivity::Offline);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, ManualNetworkInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualNetwork {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}

#[async_trait]
impl NetworkMonitor for ManualNetwork {
    async fn current(&self) -> Result<Connectivity> {
        Ok(self.lock().current)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Connectivity> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_connected() {
        assert_eq!(Connectivity::from_connected(Some(true)), Connectivity::Online);
        assert_eq!(Connectivity::from_connected(Some(false)), Connectivity::Offline);
        assert_eq!(Connectivity::from_connected(None), Connectivity::Unknown);
        assert!(!Connectivity::Unknown.is_online());
    }

    #[tokio::test]
    async fn test_manual_network_current() {
        let network = ManualNetwork::new(Connectivity::Offline);
        assert_eq!(network.current().await.unwrap(), Connectivity::Offline);

        network.go_online();
        assert_eq!(network.current().await.unwrap(), Connectivity::Online);
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let network = ManualNetwork::new(Connectivity::Online);
        let mut changes = network.subscribe();
        assert_eq!(network.subscriber_count(), 1);

        network.go_offline();
        network.go_online();
        assert_eq!(changes.recv().await, Some(Connectivity::Offline));
        assert_eq!(changes.recv().await, Some(Connectivity::Online));

        drop(changes);
        assert_eq!(network.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_set_without_subscribers() {
        let network = ManualNetwork::default();
        network.go_offline();
        assert_eq!(network.current().await.unwrap(), Connectivity::Offline);

        // Late subscribers only see later changes
        let mut changes = network.subscribe();
        network.set(Connectivity::Unknown);
        assert_eq!(changes.recv().await, Some(Connectivity::Unknown));
    }
}
