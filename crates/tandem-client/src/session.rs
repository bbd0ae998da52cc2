//! Session state.
//!
//! Exactly one [`Session`] exists per client. It is owned by the state
//! machine; everything else sees it read-only.

use std::fmt;

use tandem_core::TimerHandle;
use tandem_proto::PartnerId;

/// Coarse session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Collecting preferences; not queued.
    Setup,
    /// Queued (or about to requeue after a skip).
    Searching,
    /// Paired with a partner.
    Matched,
    /// Partner left; showing the notice before requeueing.
    Ending,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Searching => "searching",
            Self::Matched => "matched",
            Self::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// The current partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    /// Backend identifier.
    pub id: PartnerId,
    /// Bio shown in the chat header.
    pub bio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Setup,
    Searching,
    Matched(Partner),
    Ending,
}

/// Session record.
///
/// # Invariants
///
/// - A partner is present if and only if the state is `Matched`. The
///   partner lives inside the matched phase, so no other state can carry
///   one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    phase: Phase,
}

impl Default for Session {
    fn default() -> Self {
        Self { phase: Phase::Setup }
    }
}

impl Session {
    /// Current state.
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Setup => SessionState::Setup,
            Phase::Searching => SessionState::Searching,
            Phase::Matched(_) => SessionState::Matched,
            Phase::Ending => SessionState::Ending,
        }
    }

    /// Current partner, only while matched.
    pub fn partner(&self) -> Option<&Partner> {
        match &self.phase {
            Phase::Matched(partner) => Some(partner),
            _ => None,
        }
    }

    /// Current partner's identifier.
    pub fn partner_id(&self) -> Option<&PartnerId> {
        self.partner().map(|p| &p.id)
    }

    /// Current partner's bio.
    pub fn partner_bio(&self) -> Option<&str> {
        self.partner().map(|p| p.bio.as_str())
    }

    pub(crate) fn enter_setup(&mut self) {
        self.phase = Phase::Setup;
    }

    pub(crate) fn enter_searching(&mut self) {
        self.phase = Phase::Searching;
    }

    pub(crate) fn enter_matched(&mut self, partner: Partner) {
        self.phase = Phase::Matched(partner);
    }

    pub(crate) fn enter_ending(&mut self) {
        self.phase = Phase::Ending;
    }
}

/// Why a requeue timer was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequeueReason {
    /// The user skipped the partner.
    Skip,
    /// The partner skipped or disconnected.
    PartnerLeft,
}

/// The single outstanding requeue timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeueTimer<I> {
    /// Scheduler handle.
    pub handle: TimerHandle,
    /// When it fires.
    pub due_at: I,
    /// What armed it.
    pub reason: RequeueReason,
}

/// The state machine's view of the transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No connection requested yet.
    #[default]
    Idle,
    /// Connection requested or being retried.
    Connecting,
    /// Transport reported a live connection.
    Connected,
    /// Reconnect budget spent; no automatic retry.
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_only_while_matched() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Setup);
        assert!(session.partner_id().is_none());

        session.enter_matched(Partner { id: PartnerId::from("p1"), bio: "hey".into() });
        assert_eq!(session.state(), SessionState::Matched);
        assert_eq!(session.partner_bio(), Some("hey"));

        session.enter_ending();
        assert_eq!(session.state(), SessionState::Ending);
        assert!(session.partner().is_none());
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Searching.to_string(), "searching");
    }
}
