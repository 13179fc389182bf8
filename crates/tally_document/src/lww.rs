//! Last-writer-wins map document.

use crate::document::{Observer, Origin, ReplicatedDocument};
use crate::error::{DocumentError, DocumentResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A hybrid logical stamp ordering concurrent writes.
///
/// Stamps compare by wall-clock milliseconds first, then by device id as
/// a total-order tiebreak. Two writes never carry the same stamp unless
/// they are the same write.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LwwStamp {
    /// Milliseconds since the Unix epoch, advanced past any stamp seen.
    pub at_ms: i64,
    /// Device that produced the write.
    pub device_id: String,
}

/// The current winner for one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LwwRegister {
    /// Stamp of the winning write.
    pub stamp: LwwStamp,
    /// Entry payload; `None` is a tombstone.
    pub value: Option<Vec<u8>>,
}

/// Wire shape of a delta: the set of registers touched by one change.
type Delta = BTreeMap<String, LwwRegister>;

fn encode_delta(delta: &Delta) -> DocumentResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(delta, &mut buf).map_err(|e| DocumentError::Encode(e.to_string()))?;
    Ok(buf)
}

fn decode_delta(bytes: &[u8]) -> DocumentResult<Delta> {
    ciborium::from_reader(bytes).map_err(|e| DocumentError::Decode(e.to_string()))
}

/// A last-writer-wins map keyed by ledger entry id.
///
/// Each entry holds the register with the greatest stamp observed for its
/// key. Merging keeps the per-key maximum, which makes `apply_delta`
/// idempotent (re-applying a winner changes nothing) and commutative
/// (maximum is order-independent). A full snapshot is encoded in the same
/// shape as a delta, so snapshots merge through the normal apply path.
pub struct LwwDocument {
    device_id: String,
    entries: BTreeMap<String, LwwRegister>,
    /// Highest stamp millisecond value seen, local or remote.
    last_stamp_ms: i64,
    observers: Vec<Observer>,
}

impl LwwDocument {
    /// Creates an empty document owned by the given device.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            entries: BTreeMap::new(),
            last_stamp_ms: 0,
            observers: Vec::new(),
        }
    }

    /// Returns the owning device id.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the live value for a key, if any.
    ///
    /// Tombstoned and absent keys both return `None`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .get(key)
            .and_then(|reg| reg.value.as_deref())
    }

    /// Returns the number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|r| r.value.is_some()).count()
    }

    /// Returns true if the document has no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all registers, tombstones included.
    pub fn registers(&self) -> &BTreeMap<String, LwwRegister> {
        &self.entries
    }

    /// Writes a value under a key.
    ///
    /// Builds a single-entry delta, applies it locally and notifies
    /// subscribers with [`Origin::Local`]. Returns the encoded delta.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) -> DocumentResult<Vec<u8>> {
        let at_ms = wall_clock_ms();
        self.write_register(key.into(), Some(value), at_ms)
    }

    /// Writes a value with an explicit wall-clock stamp.
    pub fn put_at(
        &mut self,
        key: impl Into<String>,
        value: Vec<u8>,
        at_ms: i64,
    ) -> DocumentResult<Vec<u8>> {
        self.write_register(key.into(), Some(value), at_ms)
    }

    /// Tombstones a key.
    pub fn remove(&mut self, key: impl Into<String>) -> DocumentResult<Vec<u8>> {
        let at_ms = wall_clock_ms();
        self.write_register(key.into(), None, at_ms)
    }

    /// Tombstones a key with an explicit wall-clock stamp.
    pub fn remove_at(&mut self, key: impl Into<String>, at_ms: i64) -> DocumentResult<Vec<u8>> {
        self.write_register(key.into(), None, at_ms)
    }

    fn write_register(
        &mut self,
        key: String,
        value: Option<Vec<u8>>,
        at_ms: i64,
    ) -> DocumentResult<Vec<u8>> {
        let stamp = self.next_stamp(at_ms);
        let mut delta = Delta::new();
        delta.insert(key, LwwRegister { stamp, value });

        let bytes = encode_delta(&delta)?;
        self.apply_delta(&bytes, Origin::Local)?;
        Ok(bytes)
    }

    /// Produces a stamp strictly greater than any stamp seen so far.
    ///
    /// Keeps local writes ordered after already-merged remote writes even
    /// when the local wall clock lags.
    fn next_stamp(&mut self, at_ms: i64) -> LwwStamp {
        let at_ms = at_ms.max(self.last_stamp_ms + 1);
        self.last_stamp_ms = at_ms;
        LwwStamp {
            at_ms,
            device_id: self.device_id.clone(),
        }
    }

    fn merge(&mut self, delta: Delta) {
        for (key, incoming) in delta {
            self.last_stamp_ms = self.last_stamp_ms.max(incoming.stamp.at_ms);
            match self.entries.get(&key) {
                Some(current) if current.stamp >= incoming.stamp => {}
                _ => {
                    self.entries.insert(key, incoming);
                }
            }
        }
    }

    fn notify(&mut self, bytes: &[u8], origin: Origin) -> DocumentResult<()> {
        for observer in &mut self.observers {
            observer(bytes, origin).map_err(DocumentError::Observer)?;
        }
        Ok(())
    }
}

impl ReplicatedDocument for LwwDocument {
    fn encode_snapshot(&self) -> DocumentResult<Vec<u8>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        encode_delta(&self.entries)
    }

    fn apply_delta(&mut self, bytes: &[u8], origin: Origin) -> DocumentResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let delta = decode_delta(bytes)?;
        self.merge(delta);
        self.notify(bytes, origin)
    }

    fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }
}

fn wall_clock_ms() -> i64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
