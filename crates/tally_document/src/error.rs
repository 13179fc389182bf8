//! Error types for the replicated document.

use thiserror::Error;

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur while mutating or merging the document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// A delta or snapshot could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// A delta or snapshot could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// An observer rejected the change notification.
    ///
    /// Raised when a subscriber (typically the update log) fails to
    /// record the delta; the triggering mutation is not considered saved.
    #[error("observer error: {0}")]
    Observer(#[source] crate::document::ObserverError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DocumentError::Decode("truncated input".into());
        assert_eq!(err.to_string(), "decode error: truncated input");
    }
}
