//! Broadcaster configuration

use std::time::Duration;

/// How long a subscriber may take to accept a frame before it is evicted
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(200);

/// Configuration for the broadcaster's delivery policy
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Upper bound on a single per-subscriber handoff
    pub delivery_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl BroadcastConfig {
    /// Set the delivery timeout
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }
}
