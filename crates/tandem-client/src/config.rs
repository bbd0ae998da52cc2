//! Client configuration.

use std::time::Duration;

use tandem_core::MAX_IMAGE_PAYLOAD_BYTES;

/// Reconnection budget for the connection adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up for the session.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per failure.
    pub base_delay: Duration,
    /// Backoff ceiling (before jitter).
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Session engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Largest encoded image payload that may be sent.
    pub max_image_bytes: usize,
    /// Delay before rejoining the queue after the user skips.
    pub skip_requeue_delay: Duration,
    /// Delay before rejoining the queue after the partner leaves. Long
    /// enough for the "partner disconnected" notice to be read.
    pub partner_left_requeue_delay: Duration,
    /// Upper bound on waiting for a location fix during submission.
    pub location_timeout: Duration,
    /// Reconnection budget.
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: MAX_IMAGE_PAYLOAD_BYTES,
            skip_requeue_delay: Duration::from_millis(500),
            partner_left_requeue_delay: Duration::from_secs(2),
            location_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
