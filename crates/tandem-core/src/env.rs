//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the session engine from system
//! resources (clocks, randomness, sleeping). This enables:
//!
//! - Deterministic Simulation: a virtual clock and seeded RNG reproduce any
//!   timer race exactly.
//!
//! - Production Runtime: the tokio-backed implementation uses real system
//!   resources without any change to the state machine.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::{
    fmt::Debug,
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// Abstract environment providing time, randomness, and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    ///
    /// Timers store deadlines as `now + delay` and compare them with later
    /// readings, so the type needs addition with a `Duration` and a total
    /// order.
    type Instant: Copy
        + Ord
        + Debug
        + Send
        + Sync
        + Add<Duration, Output = Self::Instant>
        + Sub<Output = Duration>;

    /// Returns the current monotonic time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Milliseconds since the Unix epoch, used to timestamp rendered
    /// messages. Not required to be monotonic.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; the state machine itself never sleeps.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// Simulation implementations MUST be seeded so runs are reproducible.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
