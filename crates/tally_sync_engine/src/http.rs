//! HTTP transport implementation.
//!
//! Request and response bodies are CBOR. The actual HTTP client is
//! abstracted behind a trait so hosts can plug in whichever library they
//! already ship (reqwest, ureq, a platform webview bridge).

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tally_sync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based sync transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the remote authority (e.g. "https://sync.tally.money").
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the transport believes it can reach the server.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn post_body(&self, endpoint: &str, body: Vec<u8>) -> SyncResult<Vec<u8>> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let url = format!("{}{}", self.base_url, endpoint);
        match self.client.post(&url, body) {
            Ok(response) => {
                *self.last_error.write() = None;
                self.connected.store(true, Ordering::SeqCst);
                Ok(response)
            }
            Err(message) => {
                *self.last_error.write() = Some(message.clone());
                Err(SyncError::transport_retryable(message))
            }
        }
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let body = self.post_body("/sync/push", request.encode()?)?;
        Ok(PushResponse::decode(&body)?)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        let body = self.post_body("/sync/pull", request.encode()?)?;
        Ok(PullResponse::decode(&body)?)
    }
}

/// A server that can handle loopback requests in-process.
pub trait LoopbackServer {
    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

/// An HTTP client that routes requests directly to a loopback server.
///
/// Used by integration tests to exercise the full wire codec path without
/// network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a loopback client over the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        let path = url.find("/sync/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct ScriptedClient {
        response: Mutex<Option<Result<Vec<u8>, String>>>,
    }

    impl ScriptedClient {
        fn returning(result: Result<Vec<u8>, String>) -> Self {
            Self {
                response: Mutex::new(Some(result)),
            }
        }
    }

    impl HttpClient for ScriptedClient {
        fn post(&self, _url: &str, _body: Vec<u8>) -> Result<Vec<u8>, String> {
            self.response
                .lock()
                .take()
                .unwrap_or(Err("no response scripted".into()))
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }

    #[test]
    fn push_decodes_response() {
        let body = PushResponse::success().encode().unwrap();
        let transport =
            HttpTransport::new("https://sync.tally.money", ScriptedClient::returning(Ok(body)));

        let response = transport.push(&PushRequest::new(vec![])).unwrap();
        assert!(response.success);
        assert!(transport.last_error().is_none());
    }

    #[test]
    fn network_failure_is_retryable_transport_error() {
        let transport = HttpTransport::new(
            "https://sync.tally.money",
            ScriptedClient::returning(Err("connection refused".into())),
        );

        let result = transport.pull(&PullRequest::new(None));
        match result {
            Err(SyncError::Transport { retryable, .. }) => assert!(retryable),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(transport.last_error().as_deref(), Some("connection refused"));
    }

    #[test]
    fn garbage_body_is_a_protocol_error() {
        let transport = HttpTransport::new(
            "https://sync.tally.money",
            ScriptedClient::returning(Ok(vec![0xFF, 0x13])),
        );

        let result = transport.pull(&PullRequest::new(None));
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }
}
