//! What we track: vessels, ports and refineries.
//!
//! The upstream data mixes fields from all three kinds.  We keep the common part (identity, name,
//! region, last known position) in `TrackedEntity` and the kind-specific part in `Details`, a
//! tagged enum whose tag doubles as the entity kind.
//!
//! Entities belong to the source that produced them, the only thing we ever change is the
//! position/timestamp couple through `TrackedEntity::refresh()`.
//!
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

use crate::Position;

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Vessel,
    Port,
    Refinery,
}

impl EntityKind {
    /// Whether entities of this kind are expected to move.
    ///
    #[inline]
    pub fn is_mobile(&self) -> bool {
        matches!(self, EntityKind::Vessel)
    }
}

/// Identity of an entity, ids are only unique within one kind.
///
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: &str) -> Self {
        EntityKey {
            kind,
            id: id.to_string(),
        }
    }

    pub fn vessel(id: &str) -> Self {
        Self::new(EntityKind::Vessel, id)
    }

    pub fn port(id: &str) -> Self {
        Self::new(EntityKind::Port, id)
    }

    pub fn refinery(id: &str) -> Self {
        Self::new(EntityKind::Refinery, id)
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Vessel-only fields.  Port references are soft: a name or an id, which may not resolve.
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct VesselInfo {
    /// IMO number
    pub imo: Option<String>,
    /// MMSI (AIS identifier)
    pub mmsi: Option<String>,
    /// Tanker, LNG carrier, etc.
    #[serde(alias = "vesselType")]
    pub vessel_type: Option<String>,
    #[serde(alias = "departurePort")]
    pub departure: Option<String>,
    #[serde(alias = "destinationPort")]
    pub destination: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PortInfo {
    pub country: Option<String>,
    /// UN/LOCODE
    pub locode: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RefineryInfo {
    pub country: Option<String>,
    pub operator: Option<String>,
    /// Nameplate capacity in barrels per day
    #[serde(alias = "capacityBpd")]
    pub capacity_bpd: Option<f64>,
}

/// Kind-specific payload, the tag is the kind.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Details {
    Vessel(VesselInfo),
    Port(PortInfo),
    Refinery(RefineryInfo),
}

impl Details {
    /// Empty payload for a given kind.
    ///
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Vessel => Details::Vessel(VesselInfo::default()),
            EntityKind::Port => Details::Port(PortInfo::default()),
            EntityKind::Refinery => Details::Refinery(RefineryInfo::default()),
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        match self {
            Details::Vessel(_) => EntityKind::Vessel,
            Details::Port(_) => EntityKind::Port,
            Details::Refinery(_) => EntityKind::Refinery,
        }
    }
}

/// One vessel, port or refinery as seen by the core.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrackedEntity {
    /// Opaque, unique within its kind
    pub id: String,
    pub name: String,
    /// Free-text tag ("Persian Gulf", "North Sea", …)
    #[serde(default)]
    pub region: Option<String>,
    /// Last known position, `None` when unknown
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default, alias = "lastSeenAt")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: Details,
}

impl TrackedEntity {
    pub fn new(id: &str, name: &str, details: Details) -> Self {
        TrackedEntity {
            id: id.to_string(),
            name: name.to_string(),
            region: None,
            position: None,
            last_seen: None,
            details,
        }
    }

    pub fn vessel(id: &str, name: &str) -> Self {
        Self::new(id, name, Details::empty(EntityKind::Vessel))
    }

    pub fn port(id: &str, name: &str) -> Self {
        Self::new(id, name, Details::empty(EntityKind::Port))
    }

    pub fn refinery(id: &str, name: &str) -> Self {
        Self::new(id, name, Details::empty(EntityKind::Refinery))
    }

    /// Minimal entity for something we only know through its key, e.g. a vessel announced by
    /// the push channel before any directory read.
    ///
    pub fn placeholder(key: &EntityKey) -> Self {
        Self::new(&key.id, &key.id, Details::empty(key.kind))
    }

    /// Builder-style setter for the position.
    ///
    pub fn at(mut self, position: Position) -> Self {
        self.last_seen = Some(position.captured_at);
        self.position = Some(position);
        self
    }

    /// Builder-style setter for the region.
    ///
    pub fn in_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.details.kind()
    }

    #[inline]
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), &self.id)
    }

    /// Position if present *and* usable.
    ///
    #[inline]
    pub fn known_position(&self) -> Option<&Position> {
        self.position.as_ref().filter(|p| p.is_known())
    }

    /// Only the position and the "last seen" timestamp can be updated.
    ///
    pub fn refresh(&mut self, position: Position) {
        self.last_seen = Some(position.captured_at);
        self.position = Some(position);
    }

    pub fn vessel_info(&self) -> Option<&VesselInfo> {
        match &self.details {
            Details::Vessel(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for TrackedEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.key())
    }
}
