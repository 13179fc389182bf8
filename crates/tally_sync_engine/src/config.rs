//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Stable per-installation identifier.
    pub device_id: String,
    /// Base URL of the remote authority.
    pub server_url: String,
    /// Trailing-edge debounce window for push scheduling.
    ///
    /// Each local edit restarts the window; the push fires only after the
    /// window elapses with no further edits.
    pub debounce_window: Duration,
    /// Premium activation instant, when the account has one.
    ///
    /// A device whose bootstrap watermark is older than this pushes its
    /// full snapshot exactly once before its next pull.
    pub premium_activated_at: Option<i64>,
    /// Age bound for opportunistic pruning of synced records.
    ///
    /// `None` disables pruning; records are then only removed by an
    /// explicit maintenance action.
    pub prune_after: Option<Duration>,
}

impl SyncConfig {
    /// Creates a configuration with the default 3 second debounce window.
    pub fn new(device_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            server_url: server_url.into(),
            debounce_window: Duration::from_millis(3000),
            premium_activated_at: None,
            prune_after: None,
        }
    }

    /// Sets the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the premium activation instant.
    pub fn with_premium_activated_at(mut self, at_ms: i64) -> Self {
        self.premium_activated_at = Some(at_ms);
        self
    }

    /// Enables opportunistic pruning of synced records older than `age`.
    pub fn with_prune_after(mut self, age: Duration) -> Self {
        self.prune_after = Some(age);
        self
    }
}

/// Generates a fresh per-installation device identifier.
pub fn generate_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = SyncConfig::new("phone", "https://sync.tally.money")
            .with_debounce_window(Duration::from_millis(500))
            .with_premium_activated_at(1_000)
            .with_prune_after(Duration::from_secs(86_400));

        assert_eq!(config.device_id, "phone");
        assert_eq!(config.debounce_window, Duration::from_millis(500));
        assert_eq!(config.premium_activated_at, Some(1_000));
        assert_eq!(config.prune_after, Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn default_debounce_is_three_seconds() {
        let config = SyncConfig::new("phone", "https://sync.tally.money");
        assert_eq!(config.debounce_window, Duration::from_millis(3000));
        assert!(config.premium_activated_at.is_none());
    }

    #[test]
    fn generated_device_ids_are_unique() {
        assert_ne!(generate_device_id(), generate_device_id());
    }
}
