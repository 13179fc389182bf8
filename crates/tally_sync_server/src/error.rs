//! Server error types.

use tally_document::DocumentError;
use tally_sync_protocol::ProtocolError;
use thiserror::Error;

/// Errors from the reference sync server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A request or response body failed to encode or decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A stored payload could not be folded during compaction.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// A request was structurally valid but not acceptable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request path matched no endpoint.
    #[error("unknown path: {0}")]
    UnknownPath(String),
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
