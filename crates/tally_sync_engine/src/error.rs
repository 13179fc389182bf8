//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync cycle.
///
/// Every variant is non-fatal to the process: a failed cycle parks the
/// engine in the `Error` state and the next trigger retries. No failure
/// moves the log or the cursor.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a later attempt may succeed.
        retryable: bool,
    },

    /// Malformed or unexpected response shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local durable-log or cursor failure.
    #[error("storage error: {0}")]
    Storage(#[from] tally_update_log::LogError),

    /// A pulled delta failed to merge into the document.
    ///
    /// Must not happen with a correct CRDT; when it does, the cursor is
    /// not advanced past the failing batch so nothing is silently lost.
    #[error("apply error: {0}")]
    Apply(#[from] tally_document::DocumentError),

    /// The server rejected the request.
    #[error("server error: {0}")]
    Server(String),

    /// The transport is not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later sync attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server(_) => true,
            SyncError::NotConnected => true,
            _ => false,
        }
    }
}

impl From<tally_sync_protocol::ProtocolError> for SyncError {
    fn from(err: tally_sync_protocol::ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(SyncError::Server("internal error".into()).is_retryable());
        assert!(!SyncError::Protocol("bad frame".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to server");
    }
}
