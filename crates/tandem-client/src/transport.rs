//! Transport boundary.
//!
//! The transport delivers messages over a persistent bidirectional
//! connection. Protocol, framing and backoff are its own business; the
//! engine only sees the calls below.

use async_trait::async_trait;
use tandem_proto::{ClientMessage, ProtocolError, ServerMessage};
use thiserror::Error;

/// Errors reported by a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish a connection.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// I/O failure on an open connection.
    #[error("transport I/O error: {0}")]
    Io(String),

    /// The peer sent something that is not a protocol message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A bidirectional message transport.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection. Called again after a failure to retry.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the connection. Must be idempotent.
    async fn disconnect(&mut self);

    /// Send one message.
    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError>;

    /// Receive the next message.
    ///
    /// Must be cancel-safe: the driver races it against commands and timers
    /// and drops the future when another branch wins.
    async fn recv(&mut self) -> Result<ServerMessage, TransportError>;
}
