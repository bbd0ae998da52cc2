//! Connection lifecycle adapter.
//!
//! Wraps a [`Transport`] and reduces everything that can happen to the link
//! to three signals for the state machine: connected, connect failed and
//! reconnect exhausted. Retry pacing lives here, not in the state machine.
//!
//! # Retry policy
//!
//! Each consecutive failure doubles the backoff from `base_delay` up to
//! `max_delay`, plus up to 25% jitter. After `max_attempts` consecutive
//! failures the adapter gives up and stays down until asked to connect
//! again. A successful connect resets the count.

use std::time::Duration;

use tandem_core::env::Environment;
use tandem_proto::{ClientMessage, ServerMessage};

use crate::{
    config::ReconnectPolicy,
    event::ClientEvent,
    transport::{Transport, TransportError},
};

/// Upper bound on jitter, in percent of the backoff.
const MAX_JITTER_PERCENT: u64 = 25;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Try again after a delay.
    Retry {
        /// Number of consecutive failures so far.
        attempt: u32,
        /// Backoff including jitter.
        after: Duration,
    },
    /// Budget spent.
    Exhausted,
}

/// Counts consecutive connection failures against a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct ReconnectBudget {
    policy: ReconnectPolicy,
    failures: u32,
}

impl ReconnectBudget {
    /// Fresh budget.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, failures: 0 }
    }

    /// Consecutive failures so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether the budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.failures >= self.policy.max_attempts
    }

    /// Forget past failures.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Record a failure. `entropy` feeds the jitter.
    pub fn record_failure(&mut self, entropy: u64) -> ReconnectDecision {
        self.failures = self.failures.saturating_add(1);
        if self.is_exhausted() {
            return ReconnectDecision::Exhausted;
        }

        let exponent = (self.failures - 1).min(16);
        let backoff =
            self.policy.base_delay.saturating_mul(1 << exponent).min(self.policy.max_delay);
        let percent = u32::try_from(entropy % (MAX_JITTER_PERCENT + 1)).unwrap_or(0);
        let jitter = backoff.saturating_mul(percent) / 100;

        ReconnectDecision::Retry { attempt: self.failures, after: backoff + jitter }
    }
}

/// Connection signals for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSignal {
    /// Link is up.
    Connected,
    /// An attempt failed or the link dropped; a retry is scheduled.
    ConnectFailed,
    /// Retry budget spent.
    ReconnectExhausted,
}

impl LinkSignal {
    /// The state machine event for this signal.
    pub fn into_event<I>(self) -> ClientEvent<I> {
        match self {
            Self::Connected => ClientEvent::Connected,
            Self::ConnectFailed => ClientEvent::ConnectFailed,
            Self::ReconnectExhausted => ClientEvent::ReconnectExhausted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link<I> {
    Down,
    Up,
    RetryAt(I),
    GaveUp,
}

/// Connection lifecycle adapter around a transport.
pub struct ConnectionAdapter<T, E: Environment> {
    transport: T,
    env: E,
    budget: ReconnectBudget,
    link: Link<E::Instant>,
}

impl<T: Transport, E: Environment> ConnectionAdapter<T, E> {
    /// Wrap a transport.
    pub fn new(transport: T, env: E, policy: ReconnectPolicy) -> Self {
        Self { transport, env, budget: ReconnectBudget::new(policy), link: Link::Down }
    }

    /// Whether the link is up.
    pub fn is_up(&self) -> bool {
        self.link == Link::Up
    }

    /// Whether the adapter gave up.
    pub fn gave_up(&self) -> bool {
        self.link == Link::GaveUp
    }

    /// When the next automatic retry is due.
    pub fn retry_deadline(&self) -> Option<E::Instant> {
        match self.link {
            Link::RetryAt(at) => Some(at),
            _ => None,
        }
    }

    /// Borrow the wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the connection. A no-op when already up.
    pub async fn connect(&mut self) -> LinkSignal {
        if self.link == Link::Up {
            return LinkSignal::Connected;
        }

        match self.transport.connect().await {
            Ok(()) => {
                tracing::info!(after_failures = self.budget.failures(), "transport connected");
                self.budget.reset();
                self.link = Link::Up;
                LinkSignal::Connected
            },
            Err(error) => self.fail(&error),
        }
    }

    /// Retry if the backoff has elapsed.
    pub async fn retry_if_due(&mut self) -> Option<LinkSignal> {
        match self.link {
            Link::RetryAt(at) if at <= self.env.now() => Some(self.connect().await),
            _ => None,
        }
    }

    /// Close the connection and cancel retries.
    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
        self.budget.reset();
        self.link = Link::Down;
    }

    /// Send a message. Messages sent while the link is not up are dropped:
    /// the state machine learns about the outage through the signal.
    pub async fn send(&mut self, message: ClientMessage) -> Option<LinkSignal> {
        if self.link != Link::Up {
            tracing::warn!(?message, "link down, dropping outgoing message");
            return None;
        }

        match self.transport.send(message).await {
            Ok(()) => None,
            Err(error) => Some(self.lost(error)),
        }
    }

    /// Receive the next message. Cancel-safe if the transport's `recv` is.
    pub async fn recv(&mut self) -> Result<ServerMessage, TransportError> {
        self.transport.recv().await
    }

    /// The open link dropped.
    pub fn lost(&mut self, error: TransportError) -> LinkSignal {
        self.link = Link::Down;
        self.fail(&error)
    }

    fn fail(&mut self, error: &TransportError) -> LinkSignal {
        match self.budget.record_failure(self.env.random_u64()) {
            ReconnectDecision::Retry { attempt, after } => {
                tracing::warn!(%error, attempt, ?after, "connection failed, retrying");
                self.link = Link::RetryAt(self.env.now() + after);
                LinkSignal::ConnectFailed
            },
            ReconnectDecision::Exhausted => {
                tracing::warn!(%error, failures = self.budget.failures(), "giving up reconnecting");
                self.link = Link::GaveUp;
                LinkSignal::ReconnectExhausted
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;
    use crate::system_env::SystemEnv;

    #[derive(Default)]
    struct CountingTransport {
        refuse: bool,
        connects: u32,
        sent: Vec<ClientMessage>,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.connects += 1;
            if self.refuse {
                Err(TransportError::ConnectFailed("refused".into()))
            } else {
                Ok(())
            }
        }

        async fn disconnect(&mut self) {}

        async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
            self.sent.push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Result<ServerMessage, TransportError> {
            std::future::pending().await
        }
    }

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut budget = ReconnectBudget::new(policy());

        assert_eq!(
            budget.record_failure(0),
            ReconnectDecision::Retry { attempt: 1, after: Duration::from_millis(100) }
        );
        assert_eq!(
            budget.record_failure(0),
            ReconnectDecision::Retry { attempt: 2, after: Duration::from_millis(200) }
        );
        assert_eq!(
            budget.record_failure(0),
            ReconnectDecision::Retry { attempt: 3, after: Duration::from_millis(300) }
        );
        assert_eq!(budget.record_failure(0), ReconnectDecision::Exhausted);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn jitter_is_bounded() {
        let mut budget = ReconnectBudget::new(policy());
        let ReconnectDecision::Retry { after, .. } = budget.record_failure(25) else {
            panic!("first failure must retry");
        };
        assert_eq!(after, Duration::from_millis(125));

        budget.reset();
        let ReconnectDecision::Retry { after, .. } = budget.record_failure(u64::MAX) else {
            panic!("first failure must retry");
        };
        assert!(after <= Duration::from_millis(125));
    }

    #[test]
    fn reset_restores_budget() {
        let mut budget = ReconnectBudget::new(policy());
        for _ in 0..3 {
            budget.record_failure(0);
        }
        budget.reset();

        assert_eq!(budget.failures(), 0);
        assert!(matches!(budget.record_failure(0), ReconnectDecision::Retry { attempt: 1, .. }));
    }

    #[test]
    fn single_attempt_budget_gives_up_immediately() {
        let mut budget = ReconnectBudget::new(ReconnectPolicy { max_attempts: 1, ..policy() });
        assert_eq!(budget.record_failure(0), ReconnectDecision::Exhausted);
    }

    #[test]
    fn signals_map_to_events() {
        assert_eq!(LinkSignal::Connected.into_event::<u8>(), ClientEvent::Connected);
        assert_eq!(LinkSignal::ConnectFailed.into_event::<u8>(), ClientEvent::ConnectFailed);
        assert_eq!(
            LinkSignal::ReconnectExhausted.into_event::<u8>(),
            ClientEvent::ReconnectExhausted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn adapter_gives_up_after_budget() {
        let transport = CountingTransport { refuse: true, ..CountingTransport::default() };
        let mut adapter = ConnectionAdapter::new(transport, SystemEnv::new(), policy());

        let mut signal = adapter.connect().await;
        while signal == LinkSignal::ConnectFailed {
            assert!(adapter.retry_deadline().is_some());
            tokio::time::sleep(Duration::from_secs(1)).await;
            signal = adapter.retry_if_due().await.unwrap();
        }

        assert_eq!(signal, LinkSignal::ReconnectExhausted);
        assert!(adapter.gave_up());
        assert!(!adapter.is_up());
        assert_eq!(adapter.retry_deadline(), None);
        assert_eq!(adapter.transport().connects, policy().max_attempts);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(adapter.retry_if_due().await, None);
        assert_eq!(adapter.transport().connects, policy().max_attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_only_reach_an_open_link() {
        let mut adapter =
            ConnectionAdapter::new(CountingTransport::default(), SystemEnv::new(), policy());

        assert_eq!(adapter.send(ClientMessage::SkipPartner).await, None);
        assert!(adapter.transport().sent.is_empty());

        assert_eq!(adapter.connect().await, LinkSignal::Connected);
        assert!(!adapter.gave_up());
        assert_eq!(adapter.send(ClientMessage::SkipPartner).await, None);
        assert_eq!(adapter.transport().sent, vec![ClientMessage::SkipPartner]);
    }

    proptest! {
        #[test]
        fn retries_stay_within_jitter_window(
            entropy in prop::collection::vec(any::<u64>(), 1..12),
            max_attempts in 1u32..8,
        ) {
            let policy = ReconnectPolicy { max_attempts, ..policy() };
            let mut budget = ReconnectBudget::new(policy);

            for (n, e) in entropy.into_iter().enumerate() {
                let failures = u32::try_from(n).unwrap() + 1;
                match budget.record_failure(e) {
                    ReconnectDecision::Retry { attempt, after } => {
                        prop_assert!(failures < max_attempts);
                        prop_assert_eq!(attempt, failures);
                        let backoff = policy
                            .base_delay
                            .saturating_mul(1 << (failures - 1))
                            .min(policy.max_delay);
                        prop_assert!(after >= backoff);
                        prop_assert!(after <= backoff + backoff / 4);
                    },
                    ReconnectDecision::Exhausted => prop_assert!(failures >= max_attempts),
                }
            }
        }
    }
}
