//! Geodesic primitives.
//!
//! Everything is computed on a sphere of radius `EARTH_RADIUS_KM` with the Haversine formula,
//! which is more than enough for "what is near this ship" questions.  Bearings are not needed
//! by anything so there is none.
//!
use serde::{Deserialize, Serialize};

use crate::Position;

/// Mean Earth radius, in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Length of one degree of latitude, in km
const ONE_DEG_KM: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.;

/// Great-circle distance between two raw coordinates, in km.
///
/// Non-finite input gives `NaN`, callers are expected to weed out unknown positions first.
///
#[inline]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.).sin().powi(2);
    let c = 2. * a.sqrt().atan2((1. - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance between two positions, in km.
///
#[inline]
pub fn distance_km(a: &Position, b: &Position) -> f64 {
    haversine_km(a.lat, a.lng, b.lat, b.lng)
}

/// Bounding box around a point, used to turn a "radius around" query into something a
/// REST backend understands.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct BB {
    /// Longitude - X0
    pub min_lng: f64,
    /// Latitude - Y0
    pub min_lat: f64,
    /// Longitude - X1
    pub max_lng: f64,
    /// Latitude - Y1
    pub max_lat: f64,
}

impl BB {
    /// Take a lat/lng couple and create a box containing every point `dist` km away.
    ///
    /// The box is conservative: near the poles or across the antimeridian it widens to the full
    /// longitude range rather than wrapping.
    ///
    #[tracing::instrument]
    pub fn around(lat: f64, lng: f64, dist: f64) -> Self {
        let dlat = dist / ONE_DEG_KM;
        let min_lat = (lat - dlat).max(-90.);
        let max_lat = (lat + dlat).min(90.);

        // Shrinking of the parallels, taken at the latitude closest to the pole
        //
        let widest = min_lat.abs().max(max_lat.abs());
        let shrink = widest.to_radians().cos();

        let (min_lng, max_lng) = if shrink <= f64::EPSILON || max_lat >= 90. || min_lat <= -90. {
            (-180., 180.)
        } else {
            let dlng = dlat / shrink;
            if lng - dlng < -180. || lng + dlng > 180. {
                (-180., 180.)
            } else {
                (lng - dlng, lng + dlng)
            }
        };

        BB {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Whether the given point is inside (borders included).
    ///
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;
    use tracing::info;

    use super::*;

    fn pos(lat: f64, lng: f64) -> Position {
        Position {
            lat,
            lng,
            captured_at: Utc::now(),
        }
    }

    #[rstest]
    #[case((25.2, 55.3), (25.3, 55.4), 15.0)]
    #[case((25.2, 55.3), (51.5, - 0.1), 5474.)]
    #[case((1.25, 103.8), (30.58, 32.27), 8174.)]
    fn test_distance_known_values(#[case] a: (f64, f64), #[case] b: (f64, f64), #[case] km: f64) {
        let d = distance_km(&pos(a.0, a.1), &pos(b.0, b.1));
        assert!((d - km).abs() / km < 0.01, "got {d}, expected ~{km}");
    }

    #[test_pretty_log::test]
    fn test_distance_same_point() {
        let p = pos(54.7, -6.2);
        info!("belfast");
        assert_eq!(0., distance_km(&p, &p));
    }

    #[test]
    fn test_distance_nan_propagates() {
        assert!(haversine_km(f64::NAN, 0., 10., 10.).is_nan());
    }

    #[test]
    fn test_bb_around_dubai() {
        let bb = BB::around(25.2, 55.3, 50.);
        assert!(bb.contains(25.3, 55.4));
        assert!(!bb.contains(51.5, -0.1));
        assert!(bb.min_lat < 25.2 && bb.max_lat > 25.2);
        assert!(bb.max_lng - bb.min_lng > bb.max_lat - bb.min_lat);
    }

    #[test]
    fn test_bb_around_pole_is_full_width() {
        let bb = BB::around(89.9, 10., 100.);
        assert_eq!(-180., bb.min_lng);
        assert_eq!(180., bb.max_lng);
        assert_eq!(90., bb.max_lat);
    }

    #[test]
    fn test_bb_across_antimeridian() {
        let bb = BB::around(0., 179.9, 100.);
        assert_eq!(-180., bb.min_lng);
        assert_eq!(180., bb.max_lng);
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lng1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lng2 in -180.0f64..=180.0,
        ) {
            let a = pos(lat1, lng1);
            let b = pos(lat2, lng2);
            prop_assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
            prop_assert_eq!(0., distance_km(&a, &a));
        }

        #[test]
        fn prop_bb_contains_everything_in_range(
            lat in -80.0f64..=80.0, lng in -160.0f64..=160.0,
            bearing in 0.0f64..360.0, frac in 0.0f64..0.99,
        ) {
            let radius = 200.;
            let bb = BB::around(lat, lng, radius);

            // Walk `frac * radius` away from the centre along `bearing`
            //
            let d = frac * radius / EARTH_RADIUS_KM;
            let (phi1, l1, th) = (lat.to_radians(), lng.to_radians(), bearing.to_radians());
            let phi2 = (phi1.sin() * d.cos() + phi1.cos() * d.sin() * th.cos()).asin();
            let l2 = l1 + (th.sin() * d.sin() * phi1.cos()).atan2(d.cos() - phi1.sin() * phi2.sin());
            prop_assert!(bb.contains(phi2.to_degrees(), l2.to_degrees()));
        }
    }
}
