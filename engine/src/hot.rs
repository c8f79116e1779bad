//! Hot set: the part of a candidate list that has to be in the first batch.
//!
use std::collections::BTreeSet;

use seawatch_common::EntityKey;

use crate::ProximityResult;

/// How a session picks its hot set.  Resolved again on every scheduling run against the fresh
/// candidate list.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub enum HotSetSelector {
    /// Explicit entities, e.g. the vessels the user is following
    Ids(BTreeSet<EntityKey>),
    /// Everything tagged with this region, case does not matter
    Region(String),
    /// Everything closer than this many km to the subject
    Within(f64),
    #[default]
    Nothing,
}

impl HotSetSelector {
    pub fn ids(keys: impl IntoIterator<Item = EntityKey>) -> Self {
        HotSetSelector::Ids(keys.into_iter().collect())
    }

    pub fn region(name: &str) -> Self {
        HotSetSelector::Region(name.to_string())
    }

    pub fn is_hot(&self, r: &ProximityResult) -> bool {
        match self {
            HotSetSelector::Ids(keys) => keys.contains(&r.candidate.key()),
            HotSetSelector::Region(region) => r
                .candidate
                .region
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(region.trim())),
            HotSetSelector::Within(km) => r.distance_km <= *km,
            HotSetSelector::Nothing => false,
        }
    }
}
