//! Coarse route synthesis through a few maritime chokepoints.
//!
//! This is for drawing a plausible line on a map, not for navigation: the route is
//! origin, chokepoints picked by longitude band, live position, destination.  Only two lanes
//! are known, anything else is a straight origin/live/destination triple.
//!
use std::ops::Range;

use serde::Serialize;
use tracing::trace;

use seawatch_common::Position;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteWaypoint {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl RouteWaypoint {
    pub fn new(name: &str, lat: f64, lng: f64) -> Self {
        RouteWaypoint {
            name: name.to_string(),
            lat,
            lng,
        }
    }

    fn from_position(name: &str, p: &Position) -> Self {
        Self::new(name, p.lat, p.lng)
    }
}

struct Chokepoint {
    name: &'static str,
    lat: f64,
    lng: f64,
}

const SUEZ: Chokepoint = Chokepoint {
    name: "Suez Canal",
    lat: 30.58,
    lng: 32.27,
};

const MEDITERRANEAN: Chokepoint = Chokepoint {
    name: "Mediterranean",
    lat: 34.5,
    lng: 18.0,
};

const BAB_EL_MANDEB: Chokepoint = Chokepoint {
    name: "Bab-el-Mandeb",
    lat: 12.58,
    lng: 43.33,
};

const SINGAPORE: Chokepoint = Chokepoint {
    name: "Singapore Strait",
    lat: 1.25,
    lng: 103.8,
};

const TABLE: &[&Chokepoint] = &[&SUEZ, &MEDITERRANEAN, &BAB_EL_MANDEB, &SINGAPORE];

/// Persian Gulf to Europe
const GULF_LANE: &[&Chokepoint] = &[&SUEZ, &MEDITERRANEAN];
/// Far East to Europe
const ASIA_LANE: &[&Chokepoint] = &[&SINGAPORE, &BAB_EL_MANDEB, &SUEZ];

/// Persian Gulf
const GULF: Range<f64> = 47.0..60.0;
/// East of the Strait of Malacca
const ASIA_FROM: f64 = 95.0;
/// Anything west of the canal
const SUEZ_WEST: f64 = 32.0;

impl From<&Chokepoint> for RouteWaypoint {
    fn from(c: &Chokepoint) -> Self {
        RouteWaypoint::new(c.name, c.lat, c.lng)
    }
}

/// The static chokepoint table.
///
pub fn chokepoints() -> Vec<RouteWaypoint> {
    TABLE.iter().map(|&c| c.into()).collect()
}

/// Intermediate points for an origin/destination pair, in travel order.
///
fn lane(origin_lng: f64, destination_lng: f64) -> &'static [&'static Chokepoint] {
    let westbound = destination_lng < SUEZ_WEST;

    if GULF.contains(&origin_lng) && westbound {
        GULF_LANE
    } else if origin_lng >= ASIA_FROM && westbound {
        ASIA_LANE
    } else {
        &[]
    }
}

/// Origin, chokepoints, live position, destination.  Never fails, between 3 and 6 points.
///
pub fn synthesize(origin: &Position, live: &Position, destination: &Position) -> Vec<RouteWaypoint> {
    let via = lane(origin.lng, destination.lng);
    trace!("{} chokepoints from {} to {}", via.len(), origin, destination);

    let mut route = Vec::with_capacity(via.len() + 3);
    route.push(RouteWaypoint::from_position("origin", origin));
    route.extend(via.iter().map(|&c| RouteWaypoint::from(c)));
    route.push(RouteWaypoint::from_position("live", live));
    route.push(RouteWaypoint::from_position("destination", destination));
    route
}
