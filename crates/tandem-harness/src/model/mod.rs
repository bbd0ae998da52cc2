//! Reference model for model-based testing.
//!
//! The model is a deliberately naive rendition of the session engine: plain
//! fields, no scheduler, no environment. It is the oracle against which the
//! real [`Client`](tandem_client::Client) is checked.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Behaviour not mechanism: timers are a single `(reason, due)` pair
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod session;

pub use operation::{ImageSize, Operation, OperationError, OperationResult, SmallMessage};
pub use session::{ModelSession, ObservableState};
