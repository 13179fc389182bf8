//! Persisted sync watermarks.

use crate::error::{LogError, LogResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Persisted watermarks tracking sync progress.
///
/// `last_sync` is the server-assigned `created_at` of the most recently
/// applied pulled batch; it only moves forward, and only after the batch
/// has been durably applied. `last_premium_sync` is the client wall clock
/// of the last premium bootstrap push.
pub trait CursorStore: Send + Sync {
    /// Returns the pull watermark (0 when never synced).
    fn last_sync(&self) -> LogResult<i64>;

    /// Advances the pull watermark.
    ///
    /// Fails with [`LogError::CursorRegression`] on any attempt to move it
    /// backwards; setting the current value again is a no-op.
    fn set_last_sync(&self, at_ms: i64) -> LogResult<()>;

    /// Returns the bootstrap watermark (0 when never bootstrapped).
    fn last_premium_sync(&self) -> LogResult<i64>;

    /// Records a completed bootstrap push.
    fn set_last_premium_sync(&self, at_ms: i64) -> LogResult<()>;

    /// Zeroes both watermarks.
    ///
    /// Debug/recovery operation; the next pull re-fetches from the
    /// beginning of time, which is safe because apply is idempotent.
    fn reset(&self) -> LogResult<()>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct CursorState {
    last_sync: i64,
    last_premium_sync: i64,
}

/// An in-memory cursor store for tests.
#[derive(Default)]
pub struct MemoryCursorStore {
    state: Mutex<CursorState>,
}

impl MemoryCursorStore {
    /// Creates a store with zeroed watermarks.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn last_sync(&self) -> LogResult<i64> {
        Ok(self.state.lock().last_sync)
    }

    fn set_last_sync(&self, at_ms: i64) -> LogResult<()> {
        let mut state = self.state.lock();
        if at_ms < state.last_sync {
            return Err(LogError::CursorRegression {
                current: state.last_sync,
                attempted: at_ms,
            });
        }
        state.last_sync = at_ms;
        Ok(())
    }

    fn last_premium_sync(&self) -> LogResult<i64> {
        Ok(self.state.lock().last_premium_sync)
    }

    fn set_last_premium_sync(&self, at_ms: i64) -> LogResult<()> {
        self.state.lock().last_premium_sync = at_ms;
        Ok(())
    }

    fn reset(&self) -> LogResult<()> {
        *self.state.lock() = CursorState::default();
        Ok(())
    }
}

/// A cursor store persisted to a small CBOR state file.
///
/// Writes go to a temporary file and are renamed into place, so a crash
/// mid-write leaves the previous watermarks intact.
pub struct FileCursorStore {
    path: PathBuf,
    state: Mutex<CursorState>,
}

impl FileCursorStore {
    /// Opens or creates the state file at the given path.
    pub fn open(path: &Path) -> LogResult<Self> {
        let state = match std::fs::read(path) {
            Ok(bytes) => ciborium::from_reader(bytes.as_slice())
                .map_err(|e: ciborium::de::Error<std::io::Error>| LogError::Codec(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CursorState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: CursorState) -> LogResult<()> {
        let mut buf = Vec::new();
        ciborium::into_writer(&state, &mut buf).map_err(|e| LogError::Codec(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            use std::io::Write;
            tmp.write_all(&buf)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl CursorStore for FileCursorStore {
    fn last_sync(&self) -> LogResult<i64> {
        Ok(self.state.lock().last_sync)
    }

    fn set_last_sync(&self, at_ms: i64) -> LogResult<()> {
        let mut state = self.state.lock();
        if at_ms < state.last_sync {
            return Err(LogError::CursorRegression {
                current: state.last_sync,
                attempted: at_ms,
            });
        }
        let next = CursorState {
            last_sync: at_ms,
            ..*state
        };
        self.persist(next)?;
        *state = next;
        Ok(())
    }

    fn last_premium_sync(&self) -> LogResult<i64> {
        Ok(self.state.lock().last_premium_sync)
    }

    fn set_last_premium_sync(&self, at_ms: i64) -> LogResult<()> {
        let mut state = self.state.lock();
        let next = CursorState {
            last_premium_sync: at_ms,
            ..*state
        };
        self.persist(next)?;
        *state = next;
        Ok(())
    }

    fn reset(&self) -> LogResult<()> {
        let mut state = self.state.lock();
        self.persist(CursorState::default())?;
        *state = CursorState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_starts_at_zero() {
        let store = MemoryCursorStore::new();
        assert_eq!(store.last_sync().unwrap(), 0);
        assert_eq!(store.last_premium_sync().unwrap(), 0);
    }

    #[test]
    fn last_sync_never_regresses() {
        let store = MemoryCursorStore::new();
        store.set_last_sync(100).unwrap();
        store.set_last_sync(100).unwrap(); // same value is fine

        let result = store.set_last_sync(99);
        assert!(matches!(result, Err(LogError::CursorRegression { .. })));
        assert_eq!(store.last_sync().unwrap(), 100);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cursors.cbor");

        {
            let store = FileCursorStore::open(&path).unwrap();
            store.set_last_sync(1234).unwrap();
            store.set_last_premium_sync(5678).unwrap();
        }

        let store = FileCursorStore::open(&path).unwrap();
        assert_eq!(store.last_sync().unwrap(), 1234);
        assert_eq!(store.last_premium_sync().unwrap(), 5678);
    }

    #[test]
    fn file_store_enforces_monotonicity() {
        let dir = TempDir::new().unwrap();
        let store = FileCursorStore::open(&dir.path().join("cursors.cbor")).unwrap();

        store.set_last_sync(500).unwrap();
        assert!(store.set_last_sync(400).is_err());
        assert_eq!(store.last_sync().unwrap(), 500);
    }

    #[test]
    fn reset_zeroes_both_watermarks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cursors.cbor");

        let store = FileCursorStore::open(&path).unwrap();
        store.set_last_sync(100).unwrap();
        store.set_last_premium_sync(200).unwrap();
        store.reset().unwrap();

        assert_eq!(store.last_sync().unwrap(), 0);
        assert_eq!(store.last_premium_sync().unwrap(), 0);

        let reopened = FileCursorStore::open(&path).unwrap();
        assert_eq!(reopened.last_sync().unwrap(), 0);
    }
}
