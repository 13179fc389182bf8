//! Request handling for the sync endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::UpdateStore;
use tally_sync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// An in-process sync server.
///
/// Holds the update store and serves the three endpoints the client
/// speaks: push, pull, and stats. Bodies on the wire are CBOR, decoded
/// and re-encoded by [`handle_request`](SyncServer::handle_request);
/// the typed handlers are also public for direct in-process use.
pub struct SyncServer {
    config: ServerConfig,
    store: UpdateStore,
}

impl Default for SyncServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl SyncServer {
    /// Creates a server with the given configuration and an empty store.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            store: UpdateStore::new(),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &UpdateStore {
        &self.store
    }

    /// Handles a push request.
    ///
    /// The batch is accepted or rejected as a whole; a rejection stores
    /// nothing, so the client redelivers the identical batch later.
    pub fn handle_push(&self, request: PushRequest) -> PushResponse {
        if request.updates.len() > self.config.max_push_batch {
            return PushResponse::error(format!(
                "batch too large: {} > {}",
                request.updates.len(),
                self.config.max_push_batch
            ));
        }
        for update in &request.updates {
            if update.device_id.is_empty() {
                return PushResponse::error("missing device id");
            }
            if update.payload.len() > self.config.max_payload_bytes {
                return PushResponse::error(format!(
                    "payload too large: {} > {}",
                    update.payload.len(),
                    self.config.max_payload_bytes
                ));
            }
        }

        let count = request.updates.len();
        self.store.append_batch(request.updates);
        tracing::debug!(count, "accepted push batch");
        PushResponse::success()
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, request: PullRequest) -> PullResponse {
        PullResponse::new(self.store.updates_since(request.since))
    }

    /// Folds stored updates up to `up_to` into one snapshot record.
    pub fn compact(&self, up_to: i64) -> ServerResult<usize> {
        self.store.compact(up_to)
    }

    /// Routes a raw CBOR request body to its endpoint by path.
    pub fn handle_request(&self, path: &str, body: &[u8]) -> ServerResult<Vec<u8>> {
        match path {
            "/sync/push" => {
                let request = PushRequest::decode(body)?;
                Ok(self.handle_push(request).encode()?)
            }
            "/sync/pull" => {
                let request = PullRequest::decode(body)?;
                Ok(self.handle_pull(request).encode()?)
            }
            "/sync/stats" => Ok(self.store.stats().encode()?),
            other => Err(ServerError::UnknownPath(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_sync_protocol::PushUpdate;

    fn update(payload: Vec<u8>) -> PushUpdate {
        PushUpdate {
            payload,
            timestamp_ms: 1,
            device_id: "phone".into(),
        }
    }

    #[test]
    fn push_then_pull_round_trip() {
        let server = SyncServer::default();

        let response = server.handle_push(PushRequest::new(vec![update(vec![1, 2])]));
        assert!(response.success);

        let pulled = server.handle_pull(PullRequest::new(None));
        assert_eq!(pulled.updates.len(), 1);
        assert_eq!(pulled.updates[0].payload, vec![1, 2]);
        assert_eq!(pulled.updates[0].device_id, "phone");

        // Cursor past the update pulls nothing
        let cursor = pulled.max_created_at().unwrap();
        let empty = server.handle_pull(PullRequest::new(Some(cursor)));
        assert!(empty.updates.is_empty());
    }

    #[test]
    fn oversized_batch_is_rejected_whole() {
        let server = SyncServer::new(ServerConfig::new().with_max_push_batch(1));

        let response =
            server.handle_push(PushRequest::new(vec![update(vec![1]), update(vec![2])]));
        assert!(!response.success);
        assert!(server.store().export().is_empty());
    }

    #[test]
    fn missing_device_id_is_rejected() {
        let server = SyncServer::default();
        let response = server.handle_push(PushRequest::new(vec![PushUpdate {
            payload: vec![1],
            timestamp_ms: 1,
            device_id: String::new(),
        }]));
        assert!(!response.success);
    }

    #[test]
    fn handle_request_routes_by_path() {
        let server = SyncServer::default();

        let body = PushRequest::new(vec![update(vec![7])]).encode().unwrap();
        let response = server.handle_request("/sync/push", &body).unwrap();
        assert!(PushResponse::decode(&response).unwrap().success);

        let body = PullRequest::new(None).encode().unwrap();
        let response = server.handle_request("/sync/pull", &body).unwrap();
        assert_eq!(PullResponse::decode(&response).unwrap().updates.len(), 1);

        let stats = server.handle_request("/sync/stats", &[]).unwrap();
        assert!(!stats.is_empty());

        let missing = server.handle_request("/sync/nope", &[]);
        assert!(matches!(missing, Err(ServerError::UnknownPath(_))));
    }
}
