//! The replicated document capability trait.

use crate::error::DocumentResult;

/// Where an applied delta came from.
///
/// Every change notification carries an origin tag. The sync engine
/// enqueues `Local` deltas for transmission and ignores `Sync` deltas;
/// that filter is the sole mechanism preventing a pulled delta from being
/// pushed straight back out (echo loop between devices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Produced by an edit on this device.
    Local,
    /// Received from the remote authority and applied during a pull.
    Sync,
}

impl Origin {
    /// Returns true for deltas produced by a local edit.
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }
}

/// Error type observers may return to veto a mutation.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// A change subscriber.
///
/// Observers run synchronously after each applied delta, before the
/// mutating call returns. An observer error propagates to the mutating
/// caller, so a failed durable append means the edit is not "saved".
pub type Observer = Box<dyn FnMut(&[u8], Origin) -> Result<(), ObserverError> + Send>;

/// An opaque, mergeable, replicated document.
///
/// Implementations must guarantee that `apply_delta` is idempotent and
/// commutative, and that the output of `encode_snapshot` is itself a
/// valid delta producing an equivalent document when applied elsewhere.
pub trait ReplicatedDocument {
    /// Encodes the full current state as one mergeable blob.
    fn encode_snapshot(&self) -> DocumentResult<Vec<u8>>;

    /// Applies a delta and notifies subscribers with the given origin.
    fn apply_delta(&mut self, bytes: &[u8], origin: Origin) -> DocumentResult<()>;

    /// Registers a change subscriber.
    fn subscribe(&mut self, observer: Observer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_local() {
        assert!(Origin::Local.is_local());
        assert!(!Origin::Sync.is_local());
    }
}
