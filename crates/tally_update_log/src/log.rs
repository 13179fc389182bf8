//! The update log trait and in-memory implementation.

use crate::error::LogResult;
use crate::record::{LogStats, UpdateRecord};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// A durable, ordered record of every local delta pending transmission.
///
/// Implementations must keep `local_id` strictly increasing, never touch a
/// stored payload, and never delete an unsynced record.
pub trait UpdateLog: Send + Sync {
    /// Appends a delta, assigning the next `local_id` with `synced=false`.
    ///
    /// For durable implementations the record must survive a process crash
    /// before this returns; an error means the triggering mutation is not
    /// saved and must propagate to its caller.
    fn append(&self, payload: Vec<u8>, device_id: &str) -> LogResult<UpdateRecord>;

    /// Returns all unsynced records ordered by `local_id` ascending.
    ///
    /// The returned vector is a stable snapshot; appends racing with the
    /// call do not corrupt it.
    fn list_unsynced(&self) -> LogResult<Vec<UpdateRecord>>;

    /// Marks the given records as synced.
    ///
    /// Idempotent: unknown or already-synced ids are no-ops.
    fn mark_synced(&self, ids: &[u64]) -> LogResult<()>;

    /// Deletes synced records with `created_at_local` older than the bound.
    ///
    /// Unsynced records are never deleted. Returns the number removed.
    fn prune(&self, older_than_ms: i64) -> LogResult<usize>;

    /// Returns log statistics.
    fn stats(&self) -> LogResult<LogStats>;

    /// Returns every record in the log, ordered by `local_id`.
    fn export(&self) -> LogResult<Vec<UpdateRecord>>;

    /// Bulk-loads records, re-assigning local ids.
    ///
    /// Payloads, timestamps, device ids and synced flags are preserved.
    fn import(&self, records: Vec<UpdateRecord>) -> LogResult<()>;
}

#[derive(Default)]
struct MemoryInner {
    records: BTreeMap<u64, UpdateRecord>,
    next_id: u64,
}

/// An in-memory update log.
///
/// Used by engine unit tests and as scratch storage; offers no durability.
#[derive(Default)]
pub struct MemoryUpdateLog {
    inner: Mutex<MemoryInner>,
}

impl MemoryUpdateLog {
    /// Creates an empty in-memory log.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                records: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl UpdateLog for MemoryUpdateLog {
    fn append(&self, payload: Vec<u8>, device_id: &str) -> LogResult<UpdateRecord> {
        let mut inner = self.inner.lock();
        let record = UpdateRecord {
            local_id: inner.next_id,
            payload,
            created_at_local: crate::wall_clock_ms(),
            synced: false,
            device_id: device_id.to_string(),
        };
        inner.next_id += 1;
        inner.records.insert(record.local_id, record.clone());
        Ok(record)
    }

    fn list_unsynced(&self) -> LogResult<Vec<UpdateRecord>> {
        let inner = self.inner.lock();
        Ok(inner
            .records
            .values()
            .filter(|r| !r.synced)
            .cloned()
            .collect())
    }

    fn mark_synced(&self, ids: &[u64]) -> LogResult<()> {
        let mut inner = self.inner.lock();
        for id in ids {
            if let Some(record) = inner.records.get_mut(id) {
                record.synced = true;
            }
        }
        Ok(())
    }

    fn prune(&self, older_than_ms: i64) -> LogResult<usize> {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        inner
            .records
            .retain(|_, r| !r.synced || r.created_at_local >= older_than_ms);
        Ok(before - inner.records.len())
    }

    fn stats(&self) -> LogResult<LogStats> {
        let inner = self.inner.lock();
        Ok(LogStats {
            total: inner.records.len(),
            unsynced: inner.records.values().filter(|r| !r.synced).count(),
            payload_bytes: inner.records.values().map(|r| r.payload.len() as u64).sum(),
        })
    }

    fn export(&self) -> LogResult<Vec<UpdateRecord>> {
        let inner = self.inner.lock();
        Ok(inner.records.values().cloned().collect())
    }

    fn import(&self, records: Vec<UpdateRecord>) -> LogResult<()> {
        let mut inner = self.inner.lock();
        for mut record in records {
            record.local_id = inner.next_id;
            inner.next_id += 1;
            inner.records.insert(record.local_id, record);
        }
        Ok(())
    }
}
