use thiserror::Error;

/// Errors raised when building geographic values from raw numbers.
///
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Latitude {0} is outside [-90, 90]")]
    BadLatitude(f64),
    #[error("Longitude {0} is outside [-180, 180]")]
    BadLongitude(f64),
}
