//! Push/pull wire messages.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn encode<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    ciborium::from_reader(bytes)
        .map_err(|e: ciborium::de::Error<std::io::Error>| ProtocolError::Decode(e.to_string()))
}

/// One update in a push batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushUpdate {
    /// Encoded document delta (or a full snapshot for a bootstrap push).
    pub payload: Vec<u8>,
    /// Client wall clock at the time the delta was logged.
    ///
    /// Carried for diagnostics only; the server assigns its own
    /// `created_at` for ordering.
    pub timestamp_ms: i64,
    /// Originating device.
    pub device_id: String,
}

/// Push of an ordered batch of pending updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Updates in `local_id` order.
    pub updates: Vec<PushUpdate>,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(updates: Vec<PushUpdate>) -> Self {
        Self { updates }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode(bytes)
    }
}

/// Server verdict on a push batch. No per-item acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Whether the whole batch was accepted.
    pub success: bool,
    /// Error message when rejected.
    pub error: Option<String>,
}

impl PushResponse {
    /// Creates a success response.
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Creates a rejection response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode(bytes)
    }
}

/// Request for updates newer than a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Return updates with `created_at` strictly greater than this.
    ///
    /// `None` means "since the beginning of time" (first-ever sync).
    pub since: Option<i64>,
}

impl PullRequest {
    /// Creates a pull request from an optional cursor.
    pub fn new(since: Option<i64>) -> Self {
        Self { since }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode(bytes)
    }
}

/// One update delivered by a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUpdate {
    /// Encoded document delta.
    pub payload: Vec<u8>,
    /// Device that originally pushed the update.
    pub device_id: String,
    /// Server-assigned timestamp, authoritative for cursor advancement.
    pub created_at: i64,
}

/// Ordered updates since the requested cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Updates in `created_at` order.
    pub updates: Vec<RemoteUpdate>,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(updates: Vec<RemoteUpdate>) -> Self {
        Self { updates }
    }

    /// Returns the greatest `created_at` in the batch.
    pub fn max_created_at(&self) -> Option<i64> {
        self.updates.iter().map(|u| u.created_at).max()
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode(bytes)
    }
}

/// Remote store statistics, part of the maintenance surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatsResponse {
    /// Updates currently held by the store.
    pub update_count: u64,
    /// Updates folded away by compaction so far.
    pub compacted_count: u64,
    /// Sum of stored payload sizes.
    pub payload_bytes: u64,
    /// `created_at` of the newest stored update, if any.
    pub latest_created_at: Option<i64>,
}

impl StoreStatsResponse {
    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_request_roundtrip() {
        let request = PushRequest::new(vec![
            PushUpdate {
                payload: vec![1, 2, 3],
                timestamp_ms: 1000,
                device_id: "phone".into(),
            },
            PushUpdate {
                payload: vec![4],
                timestamp_ms: 2000,
                device_id: "phone".into(),
            },
        ]);

        let bytes = request.encode().unwrap();
        let decoded = PushRequest::decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn push_response_error_roundtrip() {
        let response = PushResponse::error("store unavailable");
        let decoded = PushResponse::decode(&response.encode().unwrap()).unwrap();

        assert!(!decoded.success);
        assert_eq!(decoded.error.as_deref(), Some("store unavailable"));
    }

    #[test]
    fn pull_request_empty_cursor() {
        let request = PullRequest::new(None);
        let decoded = PullRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded.since, None);
    }

    #[test]
    fn pull_response_max_created_at() {
        let response = PullResponse::new(vec![
            RemoteUpdate {
                payload: vec![1],
                device_id: "a".into(),
                created_at: 10,
            },
            RemoteUpdate {
                payload: vec![2],
                device_id: "b".into(),
                created_at: 30,
            },
            RemoteUpdate {
                payload: vec![3],
                device_id: "a".into(),
                created_at: 20,
            },
        ]);

        assert_eq!(response.max_created_at(), Some(30));
        assert_eq!(PullResponse::new(vec![]).max_created_at(), None);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let result = PullResponse::decode(&[0xFF, 0x01, 0x02]);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
