//! A `Position` is one timestamped fix for an entity.
//!
//! Positions coming from the outside world are not trusted: anything with a
//! non-finite or out-of-range coordinate is considered *unknown* and must be
//! left out of every distance computation (see `Position::is_known()`).
//!
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GeoError;

/// One position fix.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Position {
    /// Latitude in degrees, [-90, 90]
    pub lat: f64,
    /// Longitude in degrees, [-180, 180]
    pub lng: f64,
    /// When the fix was taken at the source
    #[serde(alias = "capturedAt")]
    pub captured_at: DateTime<Utc>,
}

impl Position {
    /// Checked constructor.
    ///
    pub fn new(lat: f64, lng: f64, captured_at: DateTime<Utc>) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::BadLatitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::BadLongitude(lng));
        }
        Ok(Position {
            lat,
            lng,
            captured_at,
        })
    }

    /// Same as `new()` but timestamped now.
    ///
    pub fn now(lat: f64, lng: f64) -> Result<Self, GeoError> {
        Self::new(lat, lng, Utc::now())
    }

    /// Whether both coordinates are usable.  Fixes received over the wire bypass `new()` so
    /// this must be checked before any distance is computed.
    ///
    #[inline]
    pub fn is_known(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})@{}", self.lat, self.lng, self.captured_at.to_rfc3339())
    }
}
