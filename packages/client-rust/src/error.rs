//! Error types for the search session and its transport.

use searchdoc_core::CodecError;

/// Failure reported by a [`SearchTransport`](crate::transport::SearchTransport).
///
/// Cloneable so the same failure can be stored on a request snapshot and
/// returned to the caller that awaited it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (connect, timeout, I/O).
    #[error("search request failed: {message}")]
    Request { message: String },
    /// The backend answered with a non-success status.
    #[error("search backend responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body was not valid JSON.
    #[error("search response is not valid JSON: {message}")]
    Decode { message: String },
}

/// Errors returned by [`SearchSession`](crate::session::SearchSession)
/// operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The document could not be mutated or compiled. Nothing was dispatched.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The dispatched request failed. The failure is also recorded on the
    /// request's state.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The compiled body could not be serialized for the transport.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}
