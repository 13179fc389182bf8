//! Update records and log statistics.

use serde::{Deserialize, Serialize};

/// One pending (or delivered) local mutation.
///
/// # Invariants
///
/// - `local_id` is unique and strictly increasing within a device's log
/// - `payload` is never mutated after insertion
/// - `synced` transitions `false -> true` exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Log-assigned sequence id, monotonically increasing per device.
    pub local_id: u64,
    /// Encoded document delta.
    pub payload: Vec<u8>,
    /// Client wall clock at append time, in milliseconds.
    pub created_at_local: i64,
    /// Whether the record has been acknowledged by the remote authority.
    pub synced: bool,
    /// Stable per-installation identifier.
    pub device_id: String,
}

/// Statistics over the update log, for the maintenance surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStats {
    /// Total number of records in the log.
    pub total: usize,
    /// Records still awaiting acknowledgement.
    pub unsynced: usize,
    /// Sum of payload sizes in bytes.
    pub payload_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips_through_cbor() {
        let record = UpdateRecord {
            local_id: 7,
            payload: vec![0xCA, 0xFE],
            created_at_local: 1_700_000_000_000,
            synced: false,
            device_id: "phone".into(),
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&record, &mut buf).unwrap();
        let decoded: UpdateRecord = ciborium::from_reader(buf.as_slice()).unwrap();

        assert_eq!(decoded, record);
    }
}
