//! # Tally Sync Server
//!
//! A reference implementation of the remote authority the sync engine
//! talks to. It speaks the same CBOR wire protocol as a production
//! deployment but runs entirely in process, which makes it the loopback
//! peer for integration tests and local development.
//!
//! The server assigns every accepted update a strictly monotonic
//! `created_at` from its own clock; client timestamps are stored for
//! diagnostics but never ordered against. Stored deltas can be folded
//! into a single snapshot record with [`SyncServer::compact`], which is
//! invisible to clients because snapshot application is idempotent.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::SyncServer;
pub use store::{StoredUpdate, UpdateStore};
