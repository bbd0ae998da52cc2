//! Client and server messages.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{error::ProtocolError, preferences::UserPreferences};

/// Image payloads longer than this are elided in `Debug` output.
const DEBUG_PREVIEW_CHARS: usize = 48;

/// Opaque identifier the backend assigns to a partner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerId(String);

impl PartnerId {
    /// Wrap a backend-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartnerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PartnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image as a text encoding (a base64 data URL).
    Image,
}

/// Chat message body as it travels on the wire.
///
/// # Security
///
/// - **Debug Elision**: The `Debug` impl never prints image payloads in full.
///   They can be megabytes of base64 and end up in logs otherwise.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Text or image.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text content, or the encoded image.
    pub content: String,
}

impl ChatPayload {
    /// Build a payload.
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self { kind, content: content.into() }
    }

    /// A text payload.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, content)
    }

    /// An image payload.
    pub fn image(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Image, content)
    }
}

impl fmt::Debug for ChatPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ChatPayload");
        debug.field("kind", &self.kind);
        match self.kind {
            MessageKind::Image if self.content.len() > DEBUG_PREVIEW_CHARS => {
                debug.field("content", &format!("<image {} bytes>", self.content.len()))
            },
            _ => debug.field("content", &self.content),
        };
        debug.finish()
    }
}

/// Messages a client sends to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the matching queue with the given preferences.
    JoinQueue(UserPreferences),
    /// Relay a chat message to the current partner.
    SendMessage(ChatPayload),
    /// Leave the current partner.
    SkipPartner,
}

/// Messages the backend sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Queued, no compatible partner yet.
    Waiting,
    /// Paired with a partner.
    MatchFound {
        /// Backend identifier of the partner.
        partner_id: PartnerId,
        /// Partner's (sanitised) bio.
        bio: String,
    },
    /// Chat message from the partner.
    #[serde(rename = "receive_message")]
    MessageReceived(ChatPayload),
    /// The partner skipped or disconnected.
    PartnerLeft,
}

impl ClientMessage {
    /// Encode as CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }
}

impl ServerMessage {
    /// Encode as CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}
