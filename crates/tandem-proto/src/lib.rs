//! Tandem wire protocol.
//!
//! Vocabulary shared by the client session engine and the matching backend.
//! Every message crossing the transport is one of two closed enums:
//!
//! - [`ClientMessage`]: client to backend (join the queue, chat, skip)
//! - [`ServerMessage`]: backend to client (waiting, match, chat, partner left)
//!
//! Messages are encoded as CBOR. Field and event names match the browser
//! socket events (`join_queue`, `match_found`, ...) so a JSON bridge can
//! reuse the same serde derives.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod message;
mod preferences;

pub use error::ProtocolError;
pub use message::{ChatPayload, ClientMessage, MessageKind, PartnerId, ServerMessage};
pub use preferences::{Coordinates, Gender, UserPreferences};
