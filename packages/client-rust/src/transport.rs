//! Transport boundary between the session and the search backend.
//!
//! The session only needs "send this JSON body, eventually get a JSON body or
//! an error". [`SearchTransport`] is that seam; [`HttpTransport`] is the
//! production implementation over `reqwest`.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::TransportError;

/// A single backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the backend origin, e.g. `/rest/search`.
    pub path: String,
    /// JSON request body.
    pub body: Value,
}

impl TransportRequest {
    /// A `POST` carrying a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body,
        }
    }
}

/// Executes backend calls. Each call settles exactly once.
///
/// Timeouts and cancellation belong to the implementation; the session only
/// distinguishes success from failure.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Send `request` and return the decoded response body.
    async fn execute(&self, request: TransportRequest) -> Result<Value, TransportError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// JSON-over-HTTP transport.
///
/// Sends `{base_url}{path}` with `Content-Type: application/json`. Non-2xx
/// responses become [`TransportError::Status`] carrying the response text.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Builds a transport for `config.base_url` with `config.request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the HTTP client cannot be built
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for a request path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<Value, TransportError> {
        let url = self.url_for(&request.path);
        let response = self
            .client
            .request(request.method, &url)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response.text().await));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode {
                message: e.to_string(),
            })
    }
}

/// Error for a non-success response. A body that cannot be read is
/// reported in place of the body text.
fn status_error<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> TransportError {
    let body = body.unwrap_or_else(|e| format!("<unreadable body: {e}>"));
    TransportError::Status { status, body }
}
