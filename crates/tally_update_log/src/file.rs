//! File-backed update log.
//!
//! The log is a single append-only file of length-prefixed CBOR frames.
//! Record payloads are never rewritten in place: a sync acknowledgement is
//! itself an appended frame, and the full state is rebuilt by replaying
//! frames on open. Pruning rewrites the live tail into a temporary file
//! and renames it over the log atomically.

use crate::error::{LogError, LogResult};
use crate::log::UpdateLog;
use crate::record::{LogStats, UpdateRecord};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One frame in the log file.
#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    /// A newly appended record (always `synced=false` when written live;
    /// pruning and import may write records with `synced=true`).
    Record(UpdateRecord),
    /// Acknowledgement flipping the listed ids to `synced=true`.
    Ack(Vec<u64>),
}

struct FileInner {
    file: File,
    records: BTreeMap<u64, UpdateRecord>,
    next_id: u64,
}

/// A durable update log backed by an append-only file.
///
/// `append` fsyncs before returning, so an acknowledged append survives a
/// process crash. A partial frame left by a crash mid-append is detected
/// and truncated on the next open.
pub struct FileUpdateLog {
    path: PathBuf,
    inner: Mutex<FileInner>,
}

impl FileUpdateLog {
    /// Opens or creates a log file at the given path, replaying its frames.
    pub fn open(path: &Path) -> LogResult<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut records = BTreeMap::new();
        let mut next_id = 1u64;
        let mut offset = 0usize;
        let mut good_end = 0usize;

        while offset < bytes.len() {
            let Some((frame, consumed)) = read_frame(&bytes[offset..]) else {
                // Partial tail from an interrupted append; drop it.
                tracing::warn!(
                    path = %path.display(),
                    offset,
                    "truncating partial frame left by a crash"
                );
                break;
            };
            let frame = frame?;
            offset += consumed;
            good_end = offset;

            match frame {
                Frame::Record(record) => {
                    next_id = next_id.max(record.local_id + 1);
                    records.insert(record.local_id, record);
                }
                Frame::Ack(ids) => {
                    for id in ids {
                        if let Some(record) = records.get_mut(&id) {
                            record.synced = true;
                        }
                    }
                }
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if (good_end as u64) < file.metadata()?.len() {
            file.set_len(good_end as u64)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileInner {
                file,
                records,
                next_id,
            }),
        })
    }

    /// Returns the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(inner: &mut FileInner, frame: &Frame) -> LogResult<()> {
        let body = encode_frame(frame)?;
        inner.file.seek(SeekFrom::End(0))?;
        inner.file.write_all(&(body.len() as u32).to_le_bytes())?;
        inner.file.write_all(&body)?;
        inner.file.sync_all()?;
        Ok(())
    }
}

fn encode_frame(frame: &Frame) -> LogResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(frame, &mut buf).map_err(|e| LogError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Reads one frame from the head of `bytes`.
///
/// Returns `None` when the buffer ends mid-frame, `Some(Err(_))` for a
/// complete but undecodable frame.
fn read_frame(bytes: &[u8]) -> Option<(LogResult<Frame>, usize)> {
    if bytes.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if bytes.len() < 4 + len {
        return None;
    }
    let frame = ciborium::from_reader(&bytes[4..4 + len])
        .map_err(|e: ciborium::de::Error<std::io::Error>| LogError::Codec(e.to_string()));
    Some((frame, 4 + len))
}

impl UpdateLog for FileUpdateLog {
    fn append(&self, payload: Vec<u8>, device_id: &str) -> LogResult<UpdateRecord> {
        let mut inner = self.inner.lock();
        let record = UpdateRecord {
            local_id: inner.next_id,
            payload,
            created_at_local: crate::wall_clock_ms(),
            synced: false,
            device_id: device_id.to_string(),
        };

        Self::write_frame(&mut inner, &Frame::Record(record.clone()))?;

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
        let effective: Vec<u64> = ids
            .iter()
            .copied()
            .filter(|id| inner.records.get(id).is_some_and(|r| !r.synced))
            .collect();
        if effective.is_empty() {
            return Ok(());
        }

        Self::write_frame(&mut inner, &Frame::Ack(effective.clone()))?;

        for id in effective {
            if let Some(record) = inner.records.get_mut(&id) {
                record.synced = true;
            }
        }
        Ok(())
    }

    fn prune(&self, older_than_ms: i64) -> LogResult<usize> {
        let mut inner = self.inner.lock();
        let before = inner.records.len();
        let retained: BTreeMap<u64, UpdateRecord> = inner
            .records
            .iter()
            .filter(|(_, r)| !r.synced || r.created_at_local >= older_than_ms)
            .map(|(id, r)| (*id, r.clone()))
            .collect();
        let removed = before - retained.len();
        if removed == 0 {
            return Ok(0);
        }

        // Rewrite the live tail and atomically replace the log file.
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in retained.values() {
                let body = encode_frame(&Frame::Record(record.clone()))?;
                tmp.write_all(&(body.len() as u32).to_le_bytes())?;
                tmp.write_all(&body)?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        inner.file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        inner.records = retained;
        Ok(removed)
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
            Self::write_frame(&mut inner, &Frame::Record(record.clone()))?;
            inner.next_id += 1;
            inner.records.insert(record.local_id, record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log(dir: &TempDir) -> FileUpdateLog {
        FileUpdateLog::open(&dir.path().join("updates.log")).unwrap()
    }

    #[test]
    fn append_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.log");

        {
            let log = FileUpdateLog::open(&path).unwrap();
            log.append(vec![1, 2, 3], "phone").unwrap();
            log.append(vec![4, 5], "phone").unwrap();
        }

        let log = FileUpdateLog::open(&path).unwrap();
        let unsynced = log.list_unsynced().unwrap();
        assert_eq!(unsynced.len(), 2);
        assert_eq!(unsynced[0].payload, vec![1, 2, 3]);
        assert_eq!(unsynced[1].payload, vec![4, 5]);
    }

    #[test]
    fn mark_synced_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.log");

        let first_id = {
            let log = FileUpdateLog::open(&path).unwrap();
            let a = log.append(vec![1], "phone").unwrap();
            log.append(vec![2], "phone").unwrap();
            log.mark_synced(&[a.local_id]).unwrap();
            a.local_id
        };

        let log = FileUpdateLog::open(&path).unwrap();
        let unsynced = log.list_unsynced().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_ne!(unsynced[0].local_id, first_id);
    }

    #[test]
    fn ids_keep_increasing_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.log");

        let last = {
            let log = FileUpdateLog::open(&path).unwrap();
            log.append(vec![1], "phone").unwrap();
            log.append(vec![2], "phone").unwrap().local_id
        };

        let log = FileUpdateLog::open(&path).unwrap();
        let next = log.append(vec![3], "phone").unwrap().local_id;
        assert!(next > last);
    }

    #[test]
    fn partial_tail_is_truncated_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updates.log");

        {
            let log = FileUpdateLog::open(&path).unwrap();
            log.append(vec![1], "phone").unwrap();
        }

        // Simulate a crash mid-append: a length prefix with no body.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&100u32.to_le_bytes()).unwrap();
            file.write_all(&[0xAB; 10]).unwrap();
        }

        let log = FileUpdateLog::open(&path).unwrap();
        assert_eq!(log.stats().unwrap().total, 1);

        // The log stays usable after truncation
        log.append(vec![2], "phone").unwrap();
        let reopened = FileUpdateLog::open(&path).unwrap();
        assert_eq!(reopened.stats().unwrap().total, 2);
    }

    #[test]
    fn prune_rewrites_only_synced_history() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);

        log.import(vec![
            UpdateRecord {
                local_id: 0,
                payload: vec![1],
                created_at_local: 100,
                synced: true,
                device_id: "phone".into(),
            },
            UpdateRecord {
                local_id: 0,
                payload: vec![2],
                created_at_local: 100,
                synced: false,
                device_id: "phone".into(),
            },
        ])
        .unwrap();

        let removed = log.prune(1_000).unwrap();
        assert_eq!(removed, 1);

        // Unsynced record survives the rewrite, also across reopen
        let reopened = FileUpdateLog::open(log.path()).unwrap();
        let unsynced = reopened.list_unsynced().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].payload, vec![2]);
    }

    #[test]
    fn export_import_roundtrip() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        log.append(vec![1], "phone").unwrap();
        log.append(vec![2], "phone").unwrap();

        let exported = log.export().unwrap();

        let other_dir = TempDir::new().unwrap();
        let restored = open_log(&other_dir);
        restored.import(exported).unwrap();

        let records = restored.export().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].payload, vec![1]);
        assert_eq!(records[1].payload, vec![2]);
    }
}
