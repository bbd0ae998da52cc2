//! Client events and actions.
//!
//! Events flow into the client from the caller; actions flow out for the
//! caller to execute. The client never performs I/O itself.

use std::fmt;

use tandem_proto::{ChatPayload, ClientMessage, MessageKind, ServerMessage, UserPreferences};

/// Inputs to the state machine.
///
/// UI commands, backend messages, connection lifecycle signals and clock
/// ticks all arrive through this one type, so they are serialized by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent<I> {
    /// The setup form was submitted.
    SubmitPreferences(UserPreferences),

    /// The user wants to send a chat message.
    SendMessage {
        /// Text or image.
        kind: MessageKind,
        /// Raw, unvalidated content.
        payload: String,
    },

    /// The user wants a different partner.
    SkipPartner,

    /// Transport established a connection.
    Connected,

    /// A connection attempt failed or an open connection dropped.
    ConnectFailed,

    /// The connection adapter gave up reconnecting.
    ReconnectExhausted,

    /// A message from the backend.
    Server(ServerMessage),

    /// Time advanced; fire due timers.
    Tick {
        /// Current time.
        now: I,
    },
}

/// Screens the renderer can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Preference form.
    Setup,
    /// Waiting for a partner.
    Searching,
    /// Chat with the partner.
    Chat,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// This client (rendered optimistically).
    Local,
    /// The partner.
    Remote,
}

/// A chat message handed to the renderer. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author.
    pub origin: Origin,
    /// Kind and content.
    pub payload: ChatPayload,
    /// Wall clock milliseconds when the client handled it.
    pub timestamp_ms: u64,
}

impl ChatMessage {
    /// Kind of the message.
    pub fn kind(&self) -> MessageKind {
        self.payload.kind
    }
}

/// Connection indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Connected.
    Live,
    /// Disconnected; the adapter may still be retrying.
    Offline,
    /// Reconnect budget spent; nothing retries until the user submits again.
    OfflinePermanent,
}

impl ConnectionStatus {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Offline => "Offline",
            Self::OfflinePermanent => "Offline - could not reconnect",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Instructions for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderInstruction {
    /// Switch screens.
    ShowView(View),
    /// Append a chat bubble.
    AppendMessage(ChatMessage),
    /// Append a grey system line.
    AppendSystemMessage(String),
    /// Clear the chat history.
    ResetChatView,
    /// Show the partner's bio.
    SetPartnerBio(String),
    /// Update the connection indicator.
    SetConnectionStatus(ConnectionStatus),
}

/// Outputs of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Open the transport connection.
    Connect,
    /// Close the transport connection and stop retrying.
    Disconnect,
    /// Emit a message to the backend. Fire-and-forget.
    Send(ClientMessage),
    /// Update the UI.
    Render(RenderInstruction),
}

impl From<RenderInstruction> for ClientAction {
    fn from(instruction: RenderInstruction) -> Self {
        Self::Render(instruction)
    }
}
