//! Tandem matchmaker.
//!
//! Backend counterpart of the session engine: pairs queued users, relays
//! chat between partners and tells the remaining side when a room breaks up.
//!
//! ## Architecture
//!
//! ```text
//! tandem-server
//!   ├─ Matchmaker   (queue, rooms, action generation)
//!   ├─ sanitize     (bio / text escaping)
//!   └─ geo          (great-circle distance)
//! ```
//!
//! Like the client, the matchmaker is Sans-IO: every operation returns the
//! messages to deliver and the caller owns the sockets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod geo;
mod matchmaker;
pub mod sanitize;

pub use error::MatchError;
pub use matchmaker::{MatchConfig, Matchmaker, Outbound, Profile, SessionId};
