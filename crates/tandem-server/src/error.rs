//! Matchmaker error types.

use thiserror::Error;

use crate::matchmaker::SessionId;

/// Errors from [`Matchmaker`](crate::Matchmaker) operations.
///
/// None of these are fatal to the matchmaker; they describe a single
/// misbehaving or out-of-date session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The session never joined the queue or already disconnected.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The operation needs a partner and the session has none.
    #[error("session {0} is not paired")]
    NotPaired(SessionId),

    /// The session tried to queue while still in a room.
    #[error("session {session} is already paired with {partner}")]
    AlreadyPaired {
        /// Session that sent the request.
        session: SessionId,
        /// Its current partner.
        partner: SessionId,
    },
}
