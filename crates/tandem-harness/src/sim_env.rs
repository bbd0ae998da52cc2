//! Virtual-clock environment.
//!
//! Time only moves when the harness calls [`SimEnv::advance`], and all
//! randomness comes from a seeded ChaCha stream, so a seed fully determines
//! a run. Clones share the clock and the stream.

use std::{
    future::Future,
    ops::{Add, Sub},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tandem_core::Environment;

/// Wall clock reported at virtual time zero (2024-01-01T00:00:00Z).
const EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Point on the virtual clock, measured from the start of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time elapsed since the start of the run.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

struct Inner {
    now: SimInstant,
    rng: ChaCha8Rng,
}

/// Deterministic [`Environment`] for simulation.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<Inner>>,
}

impl SimEnv {
    /// Environment at virtual time zero with a seeded RNG.
    pub fn with_seed(seed: u64) -> Self {
        let inner = Inner { now: SimInstant::default(), rng: ChaCha8Rng::seed_from_u64(seed) };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut inner = self.lock();
        inner.now = inner.now + by;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("now", &self.lock().now).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        self.lock().now
    }

    fn wall_clock_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.now().since_start().as_millis()).unwrap_or(u64::MAX);
        EPOCH_MILLIS.saturating_add(elapsed)
    }

    /// Advances the virtual clock and completes immediately.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}
