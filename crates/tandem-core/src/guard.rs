//! Outgoing message guard.
//!
//! Validates and shapes chat payloads before they leave the client. Pure: no
//! network or render side effects happen here, the caller decides what a
//! rejection means for the user.

use tandem_proto::{ChatPayload, MessageKind};
use thiserror::Error;

/// Largest encoded image payload accepted for sending (2 MiB).
pub const MAX_IMAGE_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Reasons an outgoing payload is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Empty or whitespace-only content.
    #[error("message is empty")]
    EmptyMessage,

    /// Encoded image exceeds the configured ceiling.
    #[error("payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge {
        /// Encoded size of the rejected payload.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },
}

impl GuardError {
    /// Whether the user should be told about the rejection.
    ///
    /// Empty messages are dropped silently; oversized images are surfaced.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. })
    }
}

/// Validator for outgoing chat payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageGuard {
    max_image_bytes: usize,
}

impl Default for MessageGuard {
    fn default() -> Self {
        Self::new(MAX_IMAGE_PAYLOAD_BYTES)
    }
}

impl MessageGuard {
    /// Create a guard with a custom image ceiling (in encoded bytes).
    pub fn new(max_image_bytes: usize) -> Self {
        Self { max_image_bytes }
    }

    /// Configured image ceiling.
    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    /// Validate a raw payload.
    ///
    /// Text is trimmed and must not be empty. Images pass through unchanged
    /// as long as their encoded size is at most the ceiling.
    pub fn validate(&self, kind: MessageKind, raw: String) -> Result<ChatPayload, GuardError> {
        match kind {
            MessageKind::Text => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(GuardError::EmptyMessage);
                }
                let content = if trimmed.len() == raw.len() { raw } else { trimmed.to_owned() };
                Ok(ChatPayload::text(content))
            },
            MessageKind::Image => {
                if raw.is_empty() {
                    return Err(GuardError::EmptyMessage);
                }
                if raw.len() > self.max_image_bytes {
                    return Err(GuardError::PayloadTooLarge {
                        size: raw.len(),
                        limit: self.max_image_bytes,
                    });
                }
                Ok(ChatPayload::image(raw))
            },
        }
    }
}

/// Validate with the default 2 MiB image ceiling.
pub fn validate(kind: MessageKind, raw: impl Into<String>) -> Result<ChatPayload, GuardError> {
    MessageGuard::default().validate(kind, raw.into())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn whitespace_text_is_empty() {
        assert_eq!(validate(MessageKind::Text, "   "), Err(GuardError::EmptyMessage));
        assert_eq!(validate(MessageKind::Text, ""), Err(GuardError::EmptyMessage));
        assert_eq!(validate(MessageKind::Text, "\n\t "), Err(GuardError::EmptyMessage));
    }

    #[test]
    fn text_is_accepted_and_trimmed() {
        assert_eq!(validate(MessageKind::Text, "hi"), Ok(ChatPayload::text("hi")));
        assert_eq!(validate(MessageKind::Text, "  hi there \n"), Ok(ChatPayload::text("hi there")));
    }

    #[test]
    fn image_at_ceiling_is_accepted() {
        let payload = "a".repeat(MAX_IMAGE_PAYLOAD_BYTES);
        let accepted = validate(MessageKind::Image, payload.clone());
        assert_eq!(accepted, Ok(ChatPayload::image(payload)));
    }

    #[test]
    fn image_over_ceiling_is_rejected() {
        let payload = "a".repeat(MAX_IMAGE_PAYLOAD_BYTES + 1);
        assert_eq!(
            validate(MessageKind::Image, payload),
            Err(GuardError::PayloadTooLarge {
                size: MAX_IMAGE_PAYLOAD_BYTES + 1,
                limit: MAX_IMAGE_PAYLOAD_BYTES,
            })
        );
    }

    #[test]
    fn default_ceiling_is_two_mib() {
        assert_eq!(MessageGuard::default().max_image_bytes(), 2 * 1024 * 1024);
        assert_eq!(MessageGuard::new(64).max_image_bytes(), 64);
    }

    #[test]
    fn image_is_not_trimmed() {
        let guard = MessageGuard::new(64);
        let accepted = guard.validate(MessageKind::Image, " data ".to_string());
        assert_eq!(accepted, Ok(ChatPayload::image(" data ")));
    }

    #[test]
    fn empty_image_is_rejected() {
        assert_eq!(validate(MessageKind::Image, ""), Err(GuardError::EmptyMessage));
    }

    #[test]
    fn only_oversize_is_user_visible() {
        assert!(!GuardError::EmptyMessage.is_user_visible());
        assert!(GuardError::PayloadTooLarge { size: 2, limit: 1 }.is_user_visible());
    }

    #[test]
    fn error_display() {
        let err = GuardError::PayloadTooLarge { size: 10, limit: 4 };
        assert_eq!(err.to_string(), "payload too large: 10 bytes exceeds limit of 4");
    }

    proptest! {
        #[test]
        fn prop_accepted_text_is_never_blank(raw in "\\PC{0,64}") {
            if let Ok(payload) = validate(MessageKind::Text, raw.clone()) {
                prop_assert!(!payload.content.trim().is_empty());
                prop_assert_eq!(payload.content.as_str(), raw.trim());
            } else {
                prop_assert!(raw.trim().is_empty());
            }
        }

        #[test]
        fn prop_image_ceiling_is_inclusive(limit in 1usize..512, len in 1usize..1024) {
            let guard = MessageGuard::new(limit);
            let result = guard.validate(MessageKind::Image, "x".repeat(len));
            prop_assert_eq!(result.is_ok(), len <= limit);
        }
    }
}
