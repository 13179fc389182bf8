//! Server configuration.

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of updates accepted in a single push.
    pub max_push_batch: usize,
    /// Maximum accepted payload size per update, in bytes.
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_push_batch: 10_000,
            max_payload_bytes: 4 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, max: usize) -> Self {
        self.max_push_batch = max;
        self
    }

    /// Sets the maximum per-update payload size.
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }
}
