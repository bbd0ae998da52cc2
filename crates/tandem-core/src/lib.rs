//! Tandem core.
//!
//! Side-effect free components used by the session state machine:
//!
//! - [`env::Environment`]: time and randomness behind a trait so the engine
//!   runs identically under a virtual clock
//! - [`guard`]: validation of outgoing chat payloads
//! - [`preferences::PreferenceStore`]: the last submitted preference bundle
//! - [`scheduler::Scheduler`]: cancellable single-shot timers
//!
//! None of these read or write session state. The state machine owns them
//! and decides when to call them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod guard;
pub mod preferences;
pub mod scheduler;

pub use env::Environment;
pub use guard::{GuardError, MAX_IMAGE_PAYLOAD_BYTES, MessageGuard};
pub use preferences::PreferenceStore;
pub use scheduler::{Fired, Scheduler, TimerHandle};
