//! Per-entity live state of one session.
//!
//! Whatever the channel, an update only replaces the current state if its fix is newer.  On a
//! tie the push channel wins, a poll then only proves the entity is still reported and refreshes
//! its timer.  The same fix coming again through the same channel is a refresh too, so an idle
//! polling loop does not look like a stream of changes.  Older fixes are discarded and do not
//! count as a sign of life.
//!
//! Staleness is computed when the state is read: an entity not refreshed within `staleness` is
//! flagged from `updated_at + staleness` on, but keeps its last position.
//!
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, trace};

use seawatch_common::{EntityKey, Position};

/// Which channel brought an update.
///
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum UpdateSource {
    Push,
    Poll,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeedState {
    pub position: Position,
    pub source: UpdateSource,
    /// Last time anything refreshed this entity
    pub updated_at: Instant,
    /// Set once the entity has not been refreshed for too long
    pub stale_since: Option<Instant>,
}

impl FeedState {
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale_since.is_some()
    }

    /// Copy with staleness resolved at `now`.
    ///
    fn at(&self, now: Instant, staleness: Duration) -> FeedState {
        let stale_since = if now.saturating_duration_since(self.updated_at) > staleness {
            Some(self.updated_at + staleness)
        } else {
            None
        };
        FeedState {
            stale_since,
            ..self.clone()
        }
    }
}

/// Result of `FeedStore::apply()`.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Applied {
    /// First time we hear about it
    New,
    /// Newer fix, or same fix from an equal or better channel
    Replaced,
    /// Nothing new, timer refreshed only
    Refreshed,
    /// Older than what we have
    Discarded,
    /// Store is closed
    Rejected,
}

impl Applied {
    /// Did the position change?
    ///
    #[inline]
    pub fn is_update(&self) -> bool {
        matches!(self, Applied::New | Applied::Replaced)
    }
}

#[derive(Debug)]
pub struct FeedStore {
    staleness: Duration,
    states: HashMap<EntityKey, FeedState>,
    /// Entities already reported stale, to log only once
    stale: HashMap<EntityKey, Instant>,
    closed: bool,
}

impl FeedStore {
    pub fn new(staleness: Duration) -> Self {
        FeedStore {
            staleness,
            states: HashMap::new(),
            stale: HashMap::new(),
            closed: false,
        }
    }

    /// Reconcile one update, see module doc for the rules.
    ///
    pub fn apply(
        &mut self,
        key: &EntityKey,
        position: Position,
        source: UpdateSource,
        now: Instant,
    ) -> Applied {
        if self.closed {
            trace!("closed, dropping {key}");
            return Applied::Rejected;
        }

        let fresh = FeedState {
            position,
            source,
            updated_at: now,
            stale_since: None,
        };

        let res = match self.states.get_mut(key) {
            None => {
                self.states.insert(key.clone(), fresh);
                Applied::New
            }
            Some(cur) => {
                if position.captured_at > cur.position.captured_at {
                    *cur = fresh;
                    Applied::Replaced
                } else if position.captured_at < cur.position.captured_at {
                    Applied::Discarded
                } else if source == cur.source && position == cur.position {
                    cur.updated_at = now;
                    Applied::Refreshed
                } else if source == UpdateSource::Push || cur.source == UpdateSource::Poll {
                    *cur = fresh;
                    Applied::Replaced
                } else {
                    cur.updated_at = now;
                    Applied::Refreshed
                }
            }
        };
        if res != Applied::Discarded {
            self.stale.remove(key);
        }
        trace!("{key} from {source}: {res:?}");
        res
    }

    /// Current state of one entity.
    ///
    pub fn get(&self, key: &EntityKey, now: Instant) -> Option<FeedState> {
        self.states.get(key).map(|s| s.at(now, self.staleness))
    }

    /// Latest position, stale or not.
    ///
    pub fn position(&self, key: &EntityKey) -> Option<Position> {
        self.states.get(key).map(|s| s.position)
    }

    /// Forget one entity entirely, a later update makes it `New` again.
    ///
    pub fn remove(&mut self, key: &EntityKey) -> Option<FeedState> {
        self.stale.remove(key);
        self.states.remove(key)
    }

    /// Every entity with staleness resolved at `now`.
    ///
    pub fn snapshot(&self, now: Instant) -> BTreeMap<EntityKey, FeedState> {
        self.states
            .iter()
            .map(|(k, s)| (k.clone(), s.at(now, self.staleness)))
            .collect()
    }

    /// Report entities that went stale since the last call.
    ///
    pub fn sweep(&mut self, now: Instant) -> Vec<EntityKey> {
        let mut newly = vec![];
        for (key, state) in self.states.iter() {
            if let Some(since) = state.at(now, self.staleness).stale_since {
                if !self.stale.contains_key(key) {
                    debug!("{key} stale since {:?}", now - since);
                    newly.push(key.clone());
                }
            }
        }
        for key in &newly {
            self.stale.insert(key.clone(), now);
        }
        newly.sort();
        newly
    }

    /// No more writes after this, existing state is dropped.
    ///
    pub fn close(&mut self) {
        self.closed = true;
        self.states.clear();
        self.stale.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn fix(lat: f64, secs: i64) -> Position {
        Position::new(lat, 55., Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()).unwrap()
    }

    fn store() -> FeedStore {
        FeedStore::new(Duration::from_secs(30))
    }

    #[test]
    fn test_store_newer_wins_either_order() {
        let key = EntityKey::vessel("1");
        let now = Instant::now();

        let mut a = store();
        a.apply(&key, fix(1., 10), UpdateSource::Poll, now);
        assert_eq!(Applied::Replaced, a.apply(&key, fix(2., 20), UpdateSource::Poll, now));

        let mut b = store();
        b.apply(&key, fix(2., 20), UpdateSource::Poll, now);
        assert_eq!(Applied::Discarded, b.apply(&key, fix(1., 10), UpdateSource::Push, now));

        assert_eq!(a.position(&key), b.position(&key));
        assert_eq!(Some(2.), a.position(&key).map(|p| p.lat));
    }

    #[rstest]
    #[case(UpdateSource::Push, UpdateSource::Poll, 1., UpdateSource::Push, Applied::Refreshed)]
    #[case(UpdateSource::Poll, UpdateSource::Push, 2., UpdateSource::Push, Applied::Replaced)]
    #[case(UpdateSource::Poll, UpdateSource::Poll, 2., UpdateSource::Poll, Applied::Replaced)]
    #[case(UpdateSource::Push, UpdateSource::Push, 2., UpdateSource::Push, Applied::Replaced)]
    fn test_store_tie(
        #[case] first: UpdateSource,
        #[case] second: UpdateSource,
        #[case] lat: f64,
        #[case] source: UpdateSource,
        #[case] res: Applied,
    ) {
        let key = EntityKey::vessel("1");
        let now = Instant::now();
        let mut s = store();
        assert_eq!(Applied::New, s.apply(&key, fix(1., 10), first, now));
        assert_eq!(res, s.apply(&key, fix(2., 10), second, now));

        let st = s.get(&key, now).unwrap();
        assert_eq!(lat, st.position.lat);
        assert_eq!(source, st.source);
    }

    #[rstest]
    #[case(UpdateSource::Poll)]
    #[case(UpdateSource::Push)]
    fn test_store_same_fix_again(#[case] source: UpdateSource) {
        let key = EntityKey::vessel("1");
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(20);
        let mut s = store();
        s.apply(&key, fix(1., 10), source, t0);

        let res = s.apply(&key, fix(1., 10), source, later);
        assert_eq!(Applied::Refreshed, res);
        assert!(!res.is_update());

        let st = s.get(&key, t0 + Duration::from_secs(45)).unwrap();
        assert_eq!(later, st.updated_at);
        assert!(!st.is_stale());
    }

    #[test]
    fn test_store_staleness() {
        let key = EntityKey::vessel("1");
        let t0 = Instant::now();
        let mut s = store();
        s.apply(&key, fix(1., 10), UpdateSource::Push, t0);

        assert!(!s.get(&key, t0 + Duration::from_secs(30)).unwrap().is_stale());

        let later = t0 + Duration::from_secs(31);
        let st = s.get(&key, later).unwrap();
        assert_eq!(Some(t0 + Duration::from_secs(30)), st.stale_since);
        assert_eq!(1., st.position.lat);

        assert_eq!(vec![key.clone()], s.sweep(later));
        assert!(s.sweep(later).is_empty());

        // an older fix is not a sign of life
        //
        s.apply(&key, fix(0., 0), UpdateSource::Poll, later);
        assert!(s.get(&key, later).unwrap().is_stale());

        // a tie from the poll side is
        //
        s.apply(&key, fix(1., 10), UpdateSource::Poll, later);
        let st = s.get(&key, later).unwrap();
        assert!(!st.is_stale());
        assert_eq!(UpdateSource::Push, st.source);
    }

    #[test]
    fn test_store_closed() {
        let key = EntityKey::vessel("1");
        let now = Instant::now();
        let mut s = store();
        s.apply(&key, fix(1., 10), UpdateSource::Push, now);
        s.close();
        assert!(s.is_empty());
        assert_eq!(Applied::Rejected, s.apply(&key, fix(1., 20), UpdateSource::Push, now));
        assert!(s.snapshot(now).is_empty());
    }

    proptest! {
        #[test]
        fn test_store_order_does_not_matter(t1 in 0i64..1000, dt in 1i64..1000, push_first in any::<bool>()) {
            let key = EntityKey::vessel("1");
            let now = Instant::now();
            let (older, newer) = (fix(1., t1), fix(2., t1 + dt));
            let (s1, s2) = if push_first {
                (UpdateSource::Push, UpdateSource::Poll)
            } else {
                (UpdateSource::Poll, UpdateSource::Push)
            };

            let mut a = store();
            a.apply(&key, older, s1, now);
            a.apply(&key, newer, s2, now);

            let mut b = store();
            b.apply(&key, newer, s2, now);
            b.apply(&key, older, s1, now);

            prop_assert_eq!(Some(newer), a.position(&key));
            prop_assert_eq!(Some(newer), b.position(&key));
        }
    }
}
