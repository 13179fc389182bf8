//! # Tally Sync Protocol
//!
//! Wire types shared by the sync engine and the remote authority.
//!
//! Both calls are all-or-nothing from the client's point of view: a push
//! response that is not an explicit success is a full failure of the
//! batch, and the client resolves partial server persistence through
//! idempotent redelivery rather than per-item acknowledgement.
//!
//! Only the server-assigned `created_at` on pulled updates is authoritative
//! for cursor advancement; the client-supplied `timestamp_ms` on pushed
//! updates is informational (clock-skew defense).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    PullRequest, PullResponse, PushRequest, PushResponse, PushUpdate, RemoteUpdate,
    StoreStatsResponse,
};
