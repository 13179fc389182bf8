//! # Tally Document
//!
//! The replicated ledger document shared by every Tally device.
//!
//! This crate provides:
//! - The [`ReplicatedDocument`] capability trait (snapshot, apply, subscribe)
//! - Origin tagging for applied deltas (local edit vs. received via sync)
//! - [`LwwDocument`], a last-writer-wins map implementation of the trait
//!
//! ## Merge algebra
//!
//! The sync engine assumes nothing about the document beyond three
//! properties of `apply_delta`:
//!
//! - **Idempotent**: applying the same delta twice equals applying it once
//! - **Commutative**: any application order converges to the same state
//! - **Snapshot-as-delta**: a full snapshot is itself a valid delta
//!
//! The last property is what lets the premium bootstrap reuse the normal
//! push path instead of a dedicated message type.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod lww;

pub use document::{Observer, ObserverError, Origin, ReplicatedDocument};
pub use error::{DocumentError, DocumentResult};
pub use lww::{LwwDocument, LwwRegister, LwwStamp};
