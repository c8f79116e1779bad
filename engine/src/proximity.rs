//! Proximity sets: who is near a given point.
//!
//! `within()` is a pure function over whatever entities it is given, the caller is responsible
//! for taking a consistent snapshot first.  Unknown positions and the subject itself are left
//! out, results are sorted by distance and only then truncated so `limit` never drops a closer
//! entity in favour of a farther one.
//!
use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use seawatch_common::{distance_km, EntityKind, Position, TrackedEntity};

/// Knobs for `within()`.
///
#[derive(Clone, Debug, Default)]
pub struct ProximityOptions {
    /// Entity the set is computed for, never part of its own results
    pub subject: Option<Arc<TrackedEntity>>,
    /// Only keep these kinds
    pub kinds: Option<Vec<EntityKind>>,
    /// Keep at most that many, closest first
    pub limit: Option<usize>,
}

impl ProximityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: Arc<TrackedEntity>) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn kinds(mut self, kinds: &[EntityKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One candidate near the subject.  The subject is the same for a whole set so it is not
/// serialised.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityResult {
    #[serde(skip)]
    pub subject: Option<Arc<TrackedEntity>>,
    pub candidate: TrackedEntity,
    pub distance_km: f64,
}

/// Ordering used for every proximity set: distance, then id and kind so equal distances always
/// come out the same way.
///
pub fn by_distance(a: &ProximityResult, b: &ProximityResult) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        .then_with(|| a.candidate.kind().cmp(&b.candidate.kind()))
}

/// All `candidates` within `radius_km` of `center`, closest first.
///
pub fn within(
    center: &Position,
    candidates: &[TrackedEntity],
    radius_km: f64,
    opts: &ProximityOptions,
) -> Vec<ProximityResult> {
    let me = opts.subject.as_ref().map(|s| s.key());

    let mut res: Vec<ProximityResult> = candidates
        .iter()
        .filter(|e| match &opts.kinds {
            Some(kinds) => kinds.contains(&e.kind()),
            None => true,
        })
        .filter(|e| me.as_ref().map_or(true, |k| e.kind() != k.kind || e.id != k.id))
        .filter_map(|e| {
            let pos = e.known_position()?;
            let distance_km = distance_km(center, pos);
            (distance_km <= radius_km).then(|| ProximityResult {
                subject: opts.subject.clone(),
                candidate: e.clone(),
                distance_km,
            })
        })
        .collect();

    res.sort_by(by_distance);
    if let Some(limit) = opts.limit {
        res.truncate(limit);
    }
    trace!("{} of {} candidates within {radius_km}km", res.len(), candidates.len());
    res
}

/// Resolve a free-text name against a directory.
///
/// Two passes over `candidates`: an exact (case-insensitive, trimmed) match anywhere in the list
/// wins, even over a substring match appearing before it.  Only if there is none, the first
/// entity in input order whose name contains the query or is contained in it.  Blank queries and
/// blank names never match.
///
pub fn nearest_by_name<'a>(query: &str, candidates: &'a [TrackedEntity]) -> Option<&'a TrackedEntity> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let named = || {
        candidates
            .iter()
            .map(|e| (e, e.name.trim().to_lowercase()))
            .filter(|(_, name)| !name.is_empty())
    };

    named()
        .find(|(_, name)| *name == query)
        .or_else(|| named().find(|(_, name)| name.contains(&query) || query.contains(name.as_str())))
        .map(|(e, _)| e)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn at(e: TrackedEntity, lat: f64, lng: f64) -> TrackedEntity {
        e.at(Position::now(lat, lng).unwrap())
    }

    fn center() -> Position {
        Position::now(25.2, 55.3).unwrap()
    }

    #[test_pretty_log::test]
    fn test_within_gulf_ports() {
        let list = vec![
            at(TrackedEntity::port("P1", "Near"), 25.3, 55.4),
            at(TrackedEntity::port("P2", "London"), 51.5, -0.1),
        ];
        let res = within(&center(), &list, 50., &ProximityOptions::new());
        assert_eq!(1, res.len());
        assert_eq!("P1", res[0].candidate.id);
        assert!(res[0].distance_km > 10. && res[0].distance_km < 16.);
    }

    #[test]
    fn test_result_json() {
        let subject = Arc::new(at(TrackedEntity::vessel("1", "Me"), 25.2, 55.3));
        let opts = ProximityOptions::new().subject(subject);
        let list = vec![at(TrackedEntity::port("P1", "Near"), 25.3, 55.4)];

        let res = within(&center(), &list, 50., &opts);
        let v = serde_json::to_value(&res[0]).unwrap();
        assert!(v.get("subject").is_none());
        assert_eq!("P1", v["candidate"]["id"]);
        assert!(v["distanceKm"].as_f64().is_some());
    }

    #[test_pretty_log::test]
    fn test_within_skips_unknown_and_subject() {
        let subject = Arc::new(at(TrackedEntity::vessel("1", "Me"), 25.2, 55.3));
        let mut broken = TrackedEntity::vessel("3", "Broken");
        broken.position = Some(Position {
            lat: f64::NAN,
            lng: 55.3,
            captured_at: Utc::now(),
        });
        let list = vec![
            (*subject).clone(),
            at(TrackedEntity::vessel("2", "Other"), 25.21, 55.31),
            broken,
            TrackedEntity::vessel("4", "Nowhere"),
            // same id, other kind: not the subject
            at(TrackedEntity::port("1", "Port One"), 25.22, 55.32),
        ];
        let opts = ProximityOptions::new().subject(subject.clone());
        let res = within(&center(), &list, 50., &opts);
        let ids: Vec<_> = res.iter().map(|r| r.candidate.key().to_string()).collect();
        assert_eq!(vec!["vessel:2", "port:1"], ids);
        assert_eq!(Some(subject), res[0].subject);
    }

    #[test]
    fn test_within_ties_by_id() {
        let list = vec![
            at(TrackedEntity::vessel("b", "B"), 25.3, 55.4),
            at(TrackedEntity::vessel("a", "A"), 25.3, 55.4),
        ];
        let res = within(&center(), &list, 50., &ProximityOptions::new());
        assert_eq!("a", res[0].candidate.id);
        assert_eq!("b", res[1].candidate.id);
    }

    #[test]
    fn test_within_kinds_and_limit() {
        let list = vec![
            at(TrackedEntity::vessel("v3", "far"), 25.6, 55.3),
            at(TrackedEntity::vessel("v1", "near"), 25.21, 55.3),
            at(TrackedEntity::refinery("r1", "refinery"), 25.2, 55.31),
            at(TrackedEntity::vessel("v2", "mid"), 25.4, 55.3),
        ];
        let opts = ProximityOptions::new()
            .kinds(&[EntityKind::Vessel])
            .limit(2);
        let res = within(&center(), &list, 100., &opts);
        let ids: Vec<_> = res.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(vec!["v1", "v2"], ids);
    }

    #[test]
    fn test_within_zero_radius() {
        let list = vec![
            at(TrackedEntity::vessel("same", "Same"), 25.2, 55.3),
            at(TrackedEntity::vessel("near", "Near"), 25.21, 55.3),
        ];
        let res = within(&center(), &list, 0., &ProximityOptions::new());
        assert_eq!(1, res.len());
        assert_eq!(0., res[0].distance_km);
    }

    fn directory() -> Vec<TrackedEntity> {
        vec![
            TrackedEntity::port("1", "Port of Rotterdam"),
            TrackedEntity::port("2", "Ras Tanura"),
            TrackedEntity::port("3", "   "),
            TrackedEntity::port("4", "Fujairah"),
            TrackedEntity::port("5", "Ras Tanura Terminal"),
        ]
    }

    #[rstest]
    #[case("rotterdam", Some("1"))]
    #[case("  FUJAIRAH ", Some("4"))]
    #[case("Fujairah Anchorage", Some("4"))]
    #[case("ras tanura terminal", Some("5"))]
    #[case("Ras", Some("2"))]
    #[case("Singapore", None)]
    #[case("", None)]
    #[case("   ", None)]
    fn test_nearest_by_name(#[case] query: &str, #[case] id: Option<&str>) {
        let list = directory();
        let found = nearest_by_name(query, &list).map(|e| e.id.as_str());
        assert_eq!(id, found);
    }

    fn arb_entities() -> impl Strategy<Value = Vec<TrackedEntity>> {
        prop::collection::vec((-60.0f64..60.0, -170.0f64..170.0), 0..40).prop_map(|v| {
            v.into_iter()
                .enumerate()
                .map(|(i, (lat, lng))| {
                    at(TrackedEntity::vessel(&format!("{i}"), "v"), lat, lng)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_within_monotonic(list in arb_entities(), r1 in 0.0f64..5000.0, extra in 0.0f64..5000.0) {
            let c = Position::now(10., 20.).unwrap();
            let small = within(&c, &list, r1, &ProximityOptions::new());
            let large = within(&c, &list, r1 + extra, &ProximityOptions::new());
            for r in &small {
                prop_assert!(large.iter().any(|l| l.candidate.id == r.candidate.id));
            }
        }

        #[test]
        fn test_within_sorted_and_limit_keeps_closest(list in arb_entities(), limit in 0usize..20) {
            let c = Position::now(10., 20.).unwrap();
            let all = within(&c, &list, 20_000., &ProximityOptions::new());
            prop_assert!(all.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));

            let some = within(&c, &list, 20_000., &ProximityOptions::new().limit(limit));
            prop_assert_eq!(&all[..limit.min(all.len())], &some[..]);
        }
    }
}
