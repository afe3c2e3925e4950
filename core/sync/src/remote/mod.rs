//! Remote API abstraction.
//!
//! The sync service only needs three calls from the backend: create
//! (POST), update (PUT) and delete (DELETE) against a target path. Any error
//! returned from a call counts as a failed delivery of that item.
//!
//! - [`HttpRemote`] talks to a JSON HTTP API
//! - [`MockRemote`] records calls and injects failures for tests

mod http;
mod mock;

pub use http::HttpRemote;
pub use mock::{MockRemote, RemoteCall};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use offsync_common::Result;

/// HTTP-style method of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteMethod {
    Post,
    Put,
    Delete,
}

impl fmt::Display for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteMethod::Post => "POST",
            RemoteMethod::Put => "PUT",
            RemoteMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Successful response from the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    /// Status code.
    pub status: u16,
    /// Decoded body, if the response had one.
    pub body: Option<Value>,
}

impl RemoteResponse {
    /// A response with a status and no body.
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }
}

/// Client for the backend the queue delivers to.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create a resource.
    async fn post(&self, path: &str, body: Option<&Value>) -> Result<RemoteResponse>;

    /// Replace or update a resource.
    async fn put(&self, path: &str, body: Option<&Value>) -> Result<RemoteResponse>;

    /// Delete a resource.
    async fn delete(&self, path: &str) -> Result<RemoteResponse>;
}
