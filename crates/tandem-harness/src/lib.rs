//! Deterministic simulation harness for tandem.
//!
//! Virtual-clock `Environment`, an in-process world wiring real clients to
//! the matchmaker, and a reference model of the session engine.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the session
//! state machine. Operations are applied to both the model and the real
//! client, and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod world;

pub use model::{
    ImageSize, ModelSession, ObservableState, Operation, OperationError, OperationResult,
    SmallMessage,
};
pub use sim_env::{SimEnv, SimInstant};
pub use world::{Line, SimClient, SimScreen, SimWorld, Violation};
