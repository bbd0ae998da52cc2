//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// CBOR serialization failed.
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed (malformed or unknown message).
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}
