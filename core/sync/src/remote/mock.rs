//! Mock remote API for testing.
//!
//! Records every call and lets tests inject failures and latency.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use offsync_common::{Error, Result};

use super::{RemoteApi, RemoteMethod, RemoteResponse};

/// A call received by [`MockRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub method: RemoteMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// Mock remote API.
///
/// Calls are recorded when they start, before any injected latency, so a
/// test can observe calls that are still in flight. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    calls: Vec<RemoteCall>,
    fail_all: Option<String>,
    fail_paths: HashSet<String>,
    fail_next: VecDeque<String>,
    latency: Option<Duration>,
}

impl MockRemote {
    /// Create a mock that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all calls received so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Fail every call with `error` until [`succeed_all`](Self::succeed_all).
    pub fn fail_all(&self, error: &str) {
        self.lock().fail_all = Some(error.to_string());
    }

    /// Stop failing every call.
    pub fn succeed_all(&self) {
        self.lock().fail_all = None;
    }

    /// Fail every call to `path`.
    pub fn fail_path(&self, path: &str) {
        self.lock().fail_paths.insert(path.to_string());
    }

    /// Fail the next call with `error`. Repeated calls queue up.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next.push_back(error.to_string());
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Clear recorded calls and injected behavior.
    pub fn reset(&self) {
        *self.lock() = MockRemoteInner::default();
    }

    fn lock(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn respond(
        &self,
        method: RemoteMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        let (outcome, latency) = {
            let mut inner = self.lock();
            inner.calls.push(RemoteCall {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });

            let failure = inner
                .fail_next
                .pop_front()
                .or_else(|| inner.fail_all.clone())
                .or_else(|| {
                    inner
                        .fail_paths
                        .contains(path)
                        .then(|| format!("{} {} rejected", method, path))
                });

            let outcome = match failure {
                Some(message) => Err(Error::Network(message)),
                None => Ok(RemoteResponse::empty(match method {
                    RemoteMethod::Post => 201,
                    RemoteMethod::Put => 200,
                    RemoteMethod::Delete => 204,
                })),
            };
            (outcome, inner.latency)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn post(&self, path: &str, body: Option<&Value>) -> Result<RemoteResponse> {
        self.respond(RemoteMethod::Post, path, body).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<RemoteResponse> {
        self.respond(RemoteMethod::Put, path, body).await
    }

    async fn delete(&self, path: &str) -> Result<RemoteResponse> {
        self.respond(RemoteMethod::Delete, path, None).await
    }
}
