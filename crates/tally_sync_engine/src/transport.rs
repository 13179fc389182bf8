//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tally_sync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// Network communication with the remote authority.
///
/// Both calls are all-or-nothing: the client treats anything other than
/// an explicit push success as a full failure of the batch, and resolves
/// any partial server persistence through idempotent redelivery.
pub trait SyncTransport: Send + Sync {
    /// Transmits a batch of pending updates.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Fetches updates newer than the request cursor.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;
}

/// A scripted transport for tests.
///
/// Responses are consumed from per-call queues; with an empty queue a
/// push succeeds and a pull returns no updates. Every request is
/// recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    push_results: Mutex<VecDeque<Result<PushResponse, String>>>,
    pull_results: Mutex<VecDeque<Result<PullResponse, String>>>,
    pushed: Mutex<Vec<PushRequest>>,
    pulled: Mutex<Vec<PullRequest>>,
}

impl MockTransport {
    /// Creates a transport that accepts every push and pulls nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a push response.
    pub fn enqueue_push(&self, response: PushResponse) {
        self.push_results.lock().push_back(Ok(response));
    }

    /// Queues a push transport failure.
    pub fn enqueue_push_failure(&self, message: impl Into<String>) {
        self.push_results.lock().push_back(Err(message.into()));
    }

    /// Queues a pull response.
    pub fn enqueue_pull(&self, response: PullResponse) {
        self.pull_results.lock().push_back(Ok(response));
    }

    /// Queues a pull transport failure.
    pub fn enqueue_pull_failure(&self, message: impl Into<String>) {
        self.pull_results.lock().push_back(Err(message.into()));
    }

    /// Returns every push request seen so far.
    pub fn pushed(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Returns every pull request seen so far.
    pub fn pulled(&self) -> Vec<PullRequest> {
        self.pulled.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.pushed.lock().push(request.clone());
        match self.push_results.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(SyncError::transport_retryable(message)),
            None => Ok(PushResponse::success()),
        }
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pulled.lock().push(request.clone());
        match self.pull_results.lock().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(SyncError::transport_retryable(message)),
            None => Ok(PullResponse::new(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_defaults_to_quiet_success() {
        let transport = MockTransport::new();

        let push = transport.push(&PushRequest::new(vec![])).unwrap();
        assert!(push.success);

        let pull = transport.pull(&PullRequest::new(None)).unwrap();
        assert!(pull.updates.is_empty());
    }

    #[test]
    fn scripted_failure_then_success() {
        let transport = MockTransport::new();
        transport.enqueue_push_failure("connection reset");

        let first = transport.push(&PushRequest::new(vec![]));
        assert!(matches!(first, Err(SyncError::Transport { .. })));

        let second = transport.push(&PushRequest::new(vec![])).unwrap();
        assert!(second.success);
        assert_eq!(transport.pushed().len(), 2);
    }
}
