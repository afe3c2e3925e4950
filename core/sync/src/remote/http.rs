//! JSON-over-HTTP remote API client.

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use offsync_common::{Error, Result};

use super::{RemoteApi, RemoteMethod, RemoteResponse};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("offsync/", env!("CARGO_PKG_VERSION"));
/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Remote API client over HTTP.
///
/// Targets are appended to the base URL, so a base of
/// `https://api.example.com/api` and a target of `/items/1` resolve to
/// `https://api.example.com/api/items/1`. Absolute `http(s)://` targets are
/// used as-is.
pub struct HttpRemote {
    http: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpRemote {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// # Errors
    /// - `base_url` is not a valid absolute URL
    /// - The HTTP client cannot be built
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_client(http, base_url)
    }

    /// Create a client reusing an existing `reqwest` client.
    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            bearer_token: None,
        })
    }

    /// Send `token` as a bearer token with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a target against the base URL.
    pub fn endpoint(&self, target: &str) -> Result<Url> {
        if target.starts_with("http://") || target.starts_with("https://") {
            return Url::parse(target)
                .map_err(|e| Error::InvalidInput(format!("Invalid target '{}': {}", target, e)));
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let path = target.trim_start_matches('/');
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| Error::InvalidInput(format!("Invalid target '{}': {}", target, e)))
    }

    async fn send(
        &self,
        method: RemoteMethod,
        target: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse> {
        let url = self.endpoint(target)?;
        let verb = match method {
            RemoteMethod::Post => Method::POST,
            RemoteMethod::Put => Method::PUT,
            RemoteMethod::Delete => Method::DELETE,
        };

        let mut request = self
            .http
            .request(verb, url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {} failed: {}", method, url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response from {}: {}", url, e)))?;

        debug!("{} {} -> {}", method, url, status);

        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                message: truncate(&text),
            });
        }

        Ok(RemoteResponse {
            status: status.as_u16(),
            body: parse_body(&text),
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn post(&self, path: &str, body: Option<&Value>) -> Result<RemoteResponse> {
        self.send(RemoteMethod::Post, path, body).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<RemoteResponse> {
        self.send(RemoteMethod::Put, path, body).await
    }

    async fn delete(&self, path: &str) -> Result<RemoteResponse> {
        self.send(RemoteMethod::Delete, path, None).await
    }
}

/// Decode a response body; non-JSON text is kept as a string.
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
