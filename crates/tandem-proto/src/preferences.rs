//! User preference bundle submitted when joining the queue.

use serde::{Deserialize, Serialize};

/// Gender identity, also used for the "looking for" filter.
///
/// `Any` as a filter matches every candidate. As an identity it means the
/// user did not say, and only matches candidates looking for `Any`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Unspecified / no preference.
    #[default]
    Any,
    /// Male.
    Male,
    /// Female.
    Female,
    /// Any other identity.
    Other,
}

impl Gender {
    /// Whether a user looking for `self` accepts a candidate of `candidate`.
    pub fn accepts(self, candidate: Self) -> bool {
        self == Self::Any || self == candidate
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Preferences submitted from the setup form.
///
/// Immutable for a given queue attempt; the client re-sends the exact same
/// bundle on every automatic requeue. The bio is not validated here: an
/// empty bio is a legitimate submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// The user's own gender identity.
    #[serde(rename = "gender")]
    pub gender_identity: Gender,
    /// Which gender the user wants to be matched with.
    pub looking_for: Gender,
    /// Free-form self description shown to the partner.
    #[serde(rename = "bio")]
    pub bio_text: String,
    /// Premium users may be matched by proximity.
    pub is_premium: bool,
    /// Latitude, when location was acquired.
    #[serde(rename = "lat", default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude, when location was acquired.
    #[serde(rename = "lon", default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl UserPreferences {
    /// Build a bundle without location.
    pub fn new(
        gender_identity: Gender,
        looking_for: Gender,
        bio_text: impl Into<String>,
        is_premium: bool,
    ) -> Self {
        Self {
            gender_identity,
            looking_for,
            bio_text: bio_text.into(),
            is_premium,
            latitude: None,
            longitude: None,
        }
    }

    /// Attach (or clear) coordinates.
    #[must_use]
    pub fn with_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.latitude = coordinates.map(|c| c.latitude);
        self.longitude = coordinates.map(|c| c.longitude);
        self
    }

    /// Coordinates, only when both halves are present.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }
}
