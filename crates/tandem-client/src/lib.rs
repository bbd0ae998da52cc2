//! Tandem client
//!
//! Session engine for an anonymous one-to-one chat-matching client. Keeps a
//! single coherent answer to "who am I talking to right now" while local
//! commands, backend events and requeue timers race each other.
//!
//! # Architecture
//!
//! The client is a pure state machine that:
//! - Receives events from the caller (UI commands, backend messages,
//!   connection lifecycle signals, ticks)
//! - Produces actions for the caller to execute (connect, send, render)
//! - Uses the `Environment` trait for time and randomness (deterministic
//!   testing)
//!
//! The [`Driver`] is the async shell around it: it owns the transport,
//! renderer and location collaborators and feeds the machine one event at a
//! time.
//!
//! # Components
//!
//! - [`Client`]: the session state machine
//! - [`ClientEvent`]: events fed into the client
//! - [`ClientAction`]: actions produced by the client
//! - [`ConnectionAdapter`]: connection lifecycle with a bounded reconnect
//!   budget
//! - [`Driver`]: tokio event loop wiring everything together

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod connection;
mod driver;
mod error;
mod event;
mod location;
mod render;
mod session;
mod system_env;
mod transport;

pub use client::{Client, IMAGE_TOO_LARGE_NOTICE, PARTNER_LEFT_NOTICE};
pub use config::{ClientConfig, ReconnectPolicy};
pub use connection::{ConnectionAdapter, LinkSignal, ReconnectBudget, ReconnectDecision};
pub use driver::{Driver, DriverError, UiCommand};
pub use error::ClientError;
pub use event::{
    ChatMessage, ClientAction, ClientEvent, ConnectionStatus, Origin, RenderInstruction, View,
};
pub use location::{LocationError, LocationProvider, NoLocation};
pub use render::Renderer;
pub use session::{LinkState, Partner, RequeueReason, RequeueTimer, Session, SessionState};
pub use system_env::SystemEnv;
pub use tandem_core::env::Environment;
pub use transport::{Transport, TransportError};
