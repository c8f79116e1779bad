//! sub-module to manage filters and subscription scopes
//!
//! A `Filter` narrows a bulk read (`Fetchable::fetch_entities()`): everything, a region tag, a
//! set of ids or an area around a point.  A `Scope` is what a tracking session is interested
//! in, it is sent as-is to push channels and turned into filters for the polling fallback so both
//! ways of getting positions cover the same logical query.
//!
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::json;

use seawatch_common::{EntityKey, EntityKind, Position, BB};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Filter {
    /// Entities tagged with this region
    Region { region: String },
    /// Explicit list of ids
    Ids { ids: Vec<String> },
    /// Everything within `radius_km` of a point
    Around { lat: f64, lng: f64, radius_km: f64 },
    #[default]
    None,
}

impl Filter {
    pub fn region(name: &str) -> Self {
        Filter::Region {
            region: name.to_string(),
        }
    }

    pub fn ids(ids: &[&str]) -> Self {
        Filter::Ids {
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn around(center: &Position, radius_km: f64) -> Self {
        Filter::Around {
            lat: center.lat,
            lng: center.lng,
            radius_km,
        }
    }

    /// Query parameters for a REST backend.  An area becomes a bounding box, the backend is
    /// not expected to know about great circles and we filter the answer ourselves anyway.
    ///
    pub fn to_query(&self) -> Vec<(String, String)> {
        match self {
            Filter::None => vec![],
            Filter::Region { region } => vec![("region".to_string(), region.clone())],
            Filter::Ids { ids } => vec![("ids".to_string(), ids.join(","))],
            Filter::Around { lat, lng, radius_km } => {
                let bb = BB::around(*lat, *lng, *radius_km);
                vec![
                    ("min_lat".to_string(), format!("{:.5}", bb.min_lat)),
                    ("min_lng".to_string(), format!("{:.5}", bb.min_lng)),
                    ("max_lat".to_string(), format!("{:.5}", bb.max_lat)),
                    ("max_lng".to_string(), format!("{:.5}", bb.max_lng)),
                ]
            }
        }
    }
}

impl Display for Filter {
    /// JSON form, easy to log and to pass around.
    ///
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Filter::None => "{}".to_owned(),
            _ => json!(self).to_string(),
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for Filter {
    /// Interpret argument as a json encoded filter
    ///
    fn from(value: &str) -> Self {
        serde_json::from_str(value).unwrap_or_default()
    }
}

/// What a session wants to hear about: entities of `kinds` around `subject`.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Scope {
    pub subject: EntityKey,
    pub radius_km: f64,
    pub kinds: Vec<EntityKind>,
}

impl Scope {
    pub fn new(subject: EntityKey, radius_km: f64) -> Self {
        Scope {
            subject,
            radius_km,
            kinds: vec![EntityKind::Vessel],
        }
    }

    /// Filter to locate the subject itself.
    ///
    pub fn subject_filter(&self) -> Filter {
        Filter::Ids {
            ids: vec![self.subject.id.clone()],
        }
    }

    /// Filter to get the neighbourhood once we know where the subject is.
    ///
    pub fn area_filter(&self, center: &Position) -> Filter {
        Filter::around(center, self.radius_km)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self.kinds.iter().map(|k| k.to_string()).collect();
        write!(f, "{}+{}km[{}]", self.subject, self.radius_km, kinds.join(","))
    }
}
