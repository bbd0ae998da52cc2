//! Client error types.

use thiserror::Error;

use crate::session::SessionState;

/// Errors from client operations.
///
/// Rejected payloads and stale backend events are not errors: they produce
/// a render instruction or no actions at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Command not valid in the current state.
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// State the session was in.
        state: SessionState,
        /// Rejected operation.
        operation: &'static str,
    },

    /// A requeue was due but no preferences were ever stored.
    #[error("no stored preferences to rejoin the queue with")]
    NoStoredPreferences,
}

impl ClientError {
    /// Returns true if this error is fatal (unrecoverable).
    ///
    /// Fatal errors indicate a broken invariant in the engine. Transient
    /// errors are UI commands that raced a state change.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NoStoredPreferences => true,
            Self::InvalidState { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_is_transient() {
        let err =
            ClientError::InvalidState { state: SessionState::Setup, operation: "skip partner" };
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_preferences_is_fatal() {
        assert!(ClientError::NoStoredPreferences.is_fatal());
    }

    #[test]
    fn error_display() {
        let err =
            ClientError::InvalidState { state: SessionState::Searching, operation: "send message" };
        assert_eq!(err.to_string(), "invalid state: cannot send message while searching");
    }
}
