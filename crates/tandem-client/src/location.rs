//! Location boundary.
//!
//! Location is best effort. The driver bounds every request with a timeout
//! and submits without coordinates when none arrive.

use async_trait::async_trait;
use tandem_proto::Coordinates;
use thiserror::Error;

/// Why no location was produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    /// The user refused access.
    #[error("location permission denied")]
    Denied,

    /// No fix available.
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the device location.
#[async_trait]
pub trait LocationProvider: Send {
    /// Acquire the current position.
    async fn locate(&mut self) -> Result<Coordinates, LocationError>;
}

/// Provider for platforms without location support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn locate(&mut self) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable("no location provider".into()))
    }
}
