//! Production Environment implementation.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait backed by the tokio clock and OS randomness.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tandem_core::env::Environment;

/// Production environment using the tokio clock and cryptographic RNG.
///
/// This implementation:
/// - Uses `tokio::time::Instant` for time, so a paused test runtime also
///   pauses the session engine
/// - Uses `tokio::time::sleep()` for async sleeping
/// - Uses `getrandom` for randomness
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn wall_clock_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            // Only used for reconnect jitter; zeros just remove the jitter.
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_millis() > 1_577_836_800_000);
    }

    #[test]
    fn random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_follows_tokio_clock() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_secs(30)).await;
        let elapsed = env.now() - start;

        assert!(elapsed >= Duration::from_secs(30), "Sleep should wait at least 30s");
    }
}
