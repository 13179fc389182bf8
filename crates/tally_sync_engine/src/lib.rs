//! # Tally Sync Engine
//!
//! The client-side synchronization engine for the Tally ledger.
//!
//! This crate provides:
//! - The sync state machine (idle → syncing → idle/error)
//! - Debounced push scheduling with cancel-and-reschedule semantics
//! - Single-flight sync cycles (concurrent triggers coalesce)
//! - Pull cursor advancement against the server-assigned clock
//! - The one-time premium bootstrap push
//! - Transport abstraction with an HTTP/CBOR implementation
//!
//! ## Architecture
//!
//! The engine subscribes to the replicated document. Local-origin deltas
//! are appended to the durable update log (the edit fails if the append
//! does) and restart the debounce timer; sync-origin deltas are ignored,
//! which is what keeps pulled updates from echoing back to the server.
//!
//! A sync cycle is bootstrap-if-due, then push, then pull. The log and
//! the cursor only move forward on confirmed success: a failed push
//! leaves every record unsynced for redelivery, and the pull cursor is
//! advanced only after the whole batch has been applied.
//!
//! Local editing never blocks on sync health; a cycle failure parks the
//! engine in `Error` until the next trigger.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod debounce;
mod engine;
mod error;
mod http;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{generate_device_id, SyncConfig};
pub use debounce::DebounceTimer;
pub use engine::{SyncEngine, SyncOutcome, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use transport::{MockTransport, SyncTransport};
