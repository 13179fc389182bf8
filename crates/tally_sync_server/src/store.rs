//! The server-side update store.

use crate::error::ServerResult;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tally_document::{LwwDocument, Origin, ReplicatedDocument};
use tally_sync_protocol::{PushUpdate, RemoteUpdate, StoreStatsResponse};

/// Device id stamped on compacted snapshot records.
const COMPACTOR_DEVICE_ID: &str = "server";

/// A stored update as the server holds it.
#[derive(Debug, Clone)]
pub struct StoredUpdate {
    /// Server-local sequence number.
    pub server_id: u64,
    /// Opaque delta or snapshot bytes.
    pub payload: Vec<u8>,
    /// Device that produced the payload.
    pub device_id: String,
    /// Server-assigned arrival timestamp. This is the clock pull cursors
    /// run against; the client's own timestamp is kept only for
    /// diagnostics.
    pub created_at: i64,
    /// The client's wall-clock timestamp, informational only.
    pub client_timestamp_ms: i64,
}

#[derive(Default)]
struct StoreInner {
    updates: Vec<StoredUpdate>,
    next_id: u64,
    last_created_at: i64,
    compacted_count: u64,
}

/// Append-ordered store of pushed updates.
///
/// `created_at` values are assigned strictly monotonically from the
/// server clock, so two updates never share a timestamp and a pull
/// cursor equal to the newest `created_at` is always exact.
#[derive(Default)]
pub struct UpdateStore {
    inner: Mutex<StoreInner>,
}

impl UpdateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch of pushed updates, assigning each a server id and
    /// arrival timestamp. The batch is appended atomically.
    pub fn append_batch(&self, updates: Vec<PushUpdate>) -> Vec<u64> {
        let mut inner = self.inner.lock();
        let mut assigned = Vec::with_capacity(updates.len());

        for update in updates {
            let created_at = wall_clock_ms().max(inner.last_created_at + 1);
            inner.last_created_at = created_at;
            inner.next_id += 1;
            let server_id = inner.next_id;

            inner.updates.push(StoredUpdate {
                server_id,
                payload: update.payload,
                device_id: update.device_id,
                created_at,
                client_timestamp_ms: update.timestamp_ms,
            });
            assigned.push(server_id);
        }
        assigned
    }

    /// Returns every update with `created_at` strictly greater than
    /// `since` (or all updates when `since` is `None`), oldest first.
    pub fn updates_since(&self, since: Option<i64>) -> Vec<RemoteUpdate> {
        let bound = since.unwrap_or(i64::MIN);
        self.inner
            .lock()
            .updates
            .iter()
            .filter(|u| u.created_at > bound)
            .map(|u| RemoteUpdate {
                payload: u.payload.clone(),
                device_id: u.device_id.clone(),
                created_at: u.created_at,
            })
            .collect()
    }

    /// Folds every update with `created_at <= up_to` into a single
    /// snapshot record, and returns the number of records removed.
    ///
    /// The snapshot inherits the newest folded `created_at`, so clients
    /// whose cursor already covers the folded range never re-receive it,
    /// and clients behind the range receive the snapshot instead of the
    /// individual deltas. Merge idempotency makes the swap invisible.
    pub fn compact(&self, up_to: i64) -> ServerResult<usize> {
        let mut inner = self.inner.lock();

        let fold_count = inner
            .updates
            .iter()
            .take_while(|u| u.created_at <= up_to)
            .count();
        if fold_count < 2 {
            return Ok(0);
        }

        let mut folded = LwwDocument::new(COMPACTOR_DEVICE_ID);
        for update in &inner.updates[..fold_count] {
            folded.apply_delta(&update.payload, Origin::Sync)?;
        }
        let snapshot = folded.encode_snapshot()?;

        let first = &inner.updates[0];
        let last = &inner.updates[fold_count - 1];
        let record = StoredUpdate {
            server_id: first.server_id,
            payload: snapshot,
            device_id: COMPACTOR_DEVICE_ID.to_string(),
            created_at: last.created_at,
            client_timestamp_ms: last.client_timestamp_ms,
        };

        let removed = fold_count - 1;
        inner.updates.splice(..fold_count, [record]);
        inner.compacted_count += removed as u64;

        tracing::info!(removed, up_to, "compacted update store");
        Ok(removed)
    }

    /// Returns store-level counters.
    pub fn stats(&self) -> StoreStatsResponse {
        let inner = self.inner.lock();
        StoreStatsResponse {
            update_count: inner.updates.len() as u64,
            compacted_count: inner.compacted_count,
            payload_bytes: inner.updates.iter().map(|u| u.payload.len() as u64).sum(),
            latest_created_at: inner.updates.last().map(|u| u.created_at),
        }
    }

    /// Returns a copy of every stored record, oldest first.
    pub fn export(&self) -> Vec<StoredUpdate> {
        self.inner.lock().updates.clone()
    }

    /// Replaces the store contents with a previously exported set.
    ///
    /// Sequence and clock state resume past the imported records, so
    /// later appends stay strictly monotonic.
    pub fn import(&self, updates: Vec<StoredUpdate>) {
        let mut inner = self.inner.lock();
        inner.next_id = updates.iter().map(|u| u.server_id).max().unwrap_or(0);
        inner.last_created_at = updates.iter().map(|u| u.created_at).max().unwrap_or(0);
        inner.updates = updates;
    }
}

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
