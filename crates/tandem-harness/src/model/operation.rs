//! Operations for model-based testing.
//!
//! Each operation is one input to a single session: a UI command, a backend
//! message, a connection signal or the passage of time. They are generated
//! by proptest (and by the fuzzer through `Arbitrary`) and applied to both
//! the model and the real client.

use arbitrary::Arbitrary;

/// Inputs to one session.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// User submits the setup form.
    Submit {
        /// Whether the user is premium.
        premium: bool,
    },

    /// User sends a text message.
    SendText {
        /// Message content.
        message: SmallMessage,
    },

    /// User sends an image.
    SendImage {
        /// Size relative to the guard's ceiling.
        size: ImageSize,
    },

    /// User skips the partner.
    Skip,

    /// Backend acknowledged the queue entry.
    Waiting,

    /// Backend paired the session.
    MatchFound {
        /// Partner identity (mapped to `p<n>`).
        partner: u8,
    },

    /// Partner sent a message.
    MessageReceived {
        /// Message content.
        message: SmallMessage,
    },

    /// Partner left the room.
    PartnerLeft,

    /// Transport connected.
    Connected,

    /// Transport failed or dropped.
    ConnectFailed,

    /// Reconnect budget spent.
    ReconnectExhausted,

    /// Advance simulation time, then tick.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },
}

/// Small text content for testing.
///
/// The size class covers the interesting cases: empty, whitespace only and
/// two lengths of real text.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct SmallMessage {
    /// Content seed.
    pub seed: u8,
    /// 0-3 maps to empty/blank/short/long.
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to message text.
    pub fn to_text(self) -> String {
        let len = match self.size_class % 4 {
            0 => return String::new(),
            1 => return " \t ".to_owned(),
            2 => 8,
            _ => 64,
        };

        (0..len).map(|i: u8| char::from(b'a' + self.seed.wrapping_add(i) % 26)).collect()
    }

    /// Whether the text survives trimming.
    pub fn is_blank(self) -> bool {
        self.size_class % 4 < 2
    }
}

/// Image size relative to the guard's ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ImageSize {
    /// No content at all.
    Empty,
    /// Well under the ceiling.
    Small,
    /// Exactly the ceiling.
    AtLimit,
    /// One byte over the ceiling.
    OverLimit,
}

impl ImageSize {
    /// A payload of this size for a guard with ceiling `limit`.
    pub fn payload(self, limit: usize) -> String {
        let len = match self {
            Self::Empty => 0,
            Self::Small => limit.min(16),
            Self::AtLimit => limit,
            Self::OverLimit => limit + 1,
        };
        "A".repeat(len)
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation accepted (possibly as a no-op).
    Ok,

    /// Operation rejected.
    Error(OperationError),
}

/// Expected rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// The UI command does not apply in the current state.
    InvalidState,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if operation failed.
    pub fn is_err(self) -> bool {
        !self.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_size_classes() {
        assert!(SmallMessage { seed: 0, size_class: 0 }.to_text().is_empty());
        assert!(SmallMessage { seed: 0, size_class: 1 }.to_text().trim().is_empty());
        assert_eq!(SmallMessage { seed: 0, size_class: 2 }.to_text(), "abcdefgh");
        assert_eq!(SmallMessage { seed: 3, size_class: 7 }.to_text().len(), 64);
    }

    #[test]
    fn blank_matches_content() {
        for size_class in 0..8 {
            let message = SmallMessage { seed: 9, size_class };
            assert_eq!(message.is_blank(), message.to_text().trim().is_empty());
        }
    }

    #[test]
    fn image_sizes() {
        assert_eq!(ImageSize::Empty.payload(64).len(), 0);
        assert_eq!(ImageSize::Small.payload(64).len(), 16);
        assert_eq!(ImageSize::AtLimit.payload(64).len(), 64);
        assert_eq!(ImageSize::OverLimit.payload(64).len(), 65);
    }
}
