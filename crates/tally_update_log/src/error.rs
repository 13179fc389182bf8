//! Error types for the update log.

use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in the update log or cursor store.
#[derive(Error, Debug)]
pub enum LogError {
    /// Underlying file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An attempt to move a watermark backwards.
    #[error("cursor regression: current={current}, attempted={attempted}")]
    CursorRegression {
        /// Watermark currently persisted.
        current: i64,
        /// Value the caller tried to set.
        attempted: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LogError::CursorRegression {
            current: 10,
            attempted: 5,
        };
        assert_eq!(err.to_string(), "cursor regression: current=10, attempted=5");
    }
}
