//! # Tally Update Log
//!
//! The durable, append-only queue of pending local mutations, plus the
//! persisted sync watermarks.
//!
//! This crate provides:
//! - [`UpdateRecord`] and the [`UpdateLog`] trait (append, list, mark, prune)
//! - [`MemoryUpdateLog`] for tests and [`FileUpdateLog`] for devices
//! - [`CursorStore`] watermark persistence ([`MemoryCursorStore`],
//!   [`FileCursorStore`])
//! - Log statistics and bulk export/import for the maintenance surface
//!
//! ## Durability
//!
//! `FileUpdateLog::append` does not return until the record frame has been
//! fsynced, so a crash after a successful append never loses the edit that
//! produced it. Sync acknowledgements are appended as separate frames; the
//! original payload bytes are never rewritten in place.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod error;
mod file;
mod log;
mod record;

pub use cursor::{CursorStore, FileCursorStore, MemoryCursorStore};
pub use error::{LogError, LogResult};
pub use file::FileUpdateLog;
pub use log::{MemoryUpdateLog, UpdateLog};
pub use record::{LogStats, UpdateRecord};

/// Client wall clock in milliseconds since the Unix epoch.
pub(crate) fn wall_clock_ms() -> i64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
