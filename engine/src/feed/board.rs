//! Everything a session knows, shared between its tasks and the handle.
//!
//! The coordinator is the only writer, readers take a consistent copy and work on it without
//! holding the lock.
//!
use std::collections::BTreeMap;

use tokio::time::Instant;
use tracing::{debug, info, trace};

use seawatch_common::{distance_km, EntityKey, Position, TrackedEntity};
use seawatch_sources::Stats;

use crate::{Applied, FeedStore, SessionStatus, UpdateSource};

#[derive(Debug)]
pub struct Board {
    pub status: SessionStatus,
    pub store: FeedStore,
    /// Every entity seen so far, positions kept in line with the store
    pub roster: BTreeMap<EntityKey, TrackedEntity>,
    pub stats: Stats,
}

impl Board {
    pub fn new(store: FeedStore) -> Self {
        Board {
            status: SessionStatus::Disconnected,
            store,
            roster: BTreeMap::new(),
            stats: Stats::default(),
        }
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            info!("session {} -> {}", self.status, status);
            self.status = status;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.store.is_closed()
    }

    /// Apply one position, known entity or not.
    ///
    pub fn apply(
        &mut self,
        key: &EntityKey,
        position: Position,
        source: UpdateSource,
        now: Instant,
    ) -> Applied {
        if !position.is_known() {
            debug!("{key}: ignoring unusable position {position}");
            return Applied::Discarded;
        }

        let res = self.store.apply(key, position, source, now);
        match res {
            Applied::New | Applied::Replaced => {
                self.roster
                    .entry(key.clone())
                    .or_insert_with(|| TrackedEntity::placeholder(key))
                    .refresh(position);
            }
            Applied::Discarded => self.stats.discarded += 1,
            Applied::Refreshed | Applied::Rejected => (),
        }
        res
    }

    /// Merge the answer of a bulk read.  Metadata is taken as-is, the position goes through the
    /// store like any other update.
    ///
    pub fn merge(&mut self, list: Vec<TrackedEntity>, source: UpdateSource, now: Instant) -> usize {
        if self.is_closed() {
            trace!("closed, dropping {} entities", list.len());
            return 0;
        }

        let mut updated = 0;
        for mut e in list {
            let key = e.key();
            let position = e.known_position().copied();

            // keep the best position we have, not necessarily the one we just got
            //
            if let Some(cur) = self.store.position(&key) {
                e.position = Some(cur);
                e.last_seen = Some(cur.captured_at);
            }
            self.roster.insert(key.clone(), e);

            if let Some(position) = position {
                if self.apply(&key, position, source, now).is_update() {
                    updated += 1;
                }
            }
        }
        updated
    }

    /// Static entities (ports, refineries), roster only.
    ///
    pub fn load_directory(&mut self, list: Vec<TrackedEntity>) {
        if self.is_closed() {
            return;
        }
        for e in list {
            self.roster.entry(e.key()).or_insert(e);
        }
    }

    /// Where the subject is, live state first.
    ///
    pub fn center(&self, subject: &EntityKey) -> Option<Position> {
        self.store
            .position(subject)
            .or_else(|| self.roster.get(subject).and_then(|e| e.known_position().copied()))
    }

    /// Drop mobile entities that moved out of `radius_km` around `center`, from the roster and
    /// the store.  The subject and directory entries always stay, so do entities without a
    /// usable position.
    ///
    pub fn prune(&mut self, subject: &EntityKey, center: &Position, radius_km: f64) -> usize {
        let gone: Vec<EntityKey> = self
            .roster
            .iter()
            .filter(|(k, _)| k.kind.is_mobile() && *k != subject)
            .filter_map(|(k, e)| {
                let pos = self.store.position(k).or_else(|| e.known_position().copied())?;
                (pos.is_known() && distance_km(center, &pos) > radius_km).then(|| k.clone())
            })
            .collect();

        for key in &gone {
            trace!("{key} out of scope");
            self.roster.remove(key);
            self.store.remove(key);
        }
        gone.len()
    }

    pub fn entities(&self) -> Vec<TrackedEntity> {
        self.roster.values().cloned().collect()
    }

    /// End of the session, nothing gets in anymore.
    ///
    pub fn close(&mut self) {
        self.store.close();
        self.roster.clear();
        self.set_status(SessionStatus::Disconnected);
    }
}
