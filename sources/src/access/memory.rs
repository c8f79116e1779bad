//! In-process source, implementing both `Fetchable` and `Streamable`.
//!
//! Holds a small directory of entities and a list of push subscribers, everything behind one
//! mutex so it can be cloned and driven from a test while the engine reads from it.  It can be
//! told to refuse subscriptions or to fail bulk reads to exercise the fallback paths.
//!
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

use seawatch_common::{distance_km, EntityKey, EntityKind, Position, TrackedEntity};

use crate::{
    Fetchable, Filter, PositionUpdate, PushEvent, PushStream, Scope, SourceError, Streamable,
};

type Subscriber = UnboundedSender<Result<PushEvent, SourceError>>;

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<EntityKey, TrackedEntity>,
    subscribers: Vec<Subscriber>,
    refuse_subscribe: bool,
    fail_fetch: bool,
    fetches: usize,
    subscriptions: usize,
}

#[derive(Clone, Debug)]
pub struct MemorySource {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemorySource {
    pub fn new(name: &str) -> Self {
        MemorySource {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Add or replace an entity in the directory.
    ///
    pub fn insert(&self, entity: TrackedEntity) {
        self.inner.lock().entities.insert(entity.key(), entity);
    }

    /// Builder-style variant of `insert()`.
    ///
    pub fn with(self, entities: impl IntoIterator<Item = TrackedEntity>) -> Self {
        for e in entities {
            self.insert(e);
        }
        self
    }

    /// Change the stored position of an entity without telling subscribers, this is what a
    /// poll will see.  Returns `false` if the entity is unknown.
    ///
    pub fn update_position(&self, key: &EntityKey, position: Position) -> bool {
        match self.inner.lock().entities.get_mut(key) {
            Some(e) => {
                e.refresh(position);
                true
            }
            None => false,
        }
    }

    /// Send one event to every live subscriber, returns how many got it.
    ///
    pub fn push(&self, ev: PushEvent) -> usize {
        let mut inner = self.inner.lock();
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(Ok(ev.clone())).is_ok());
        trace!("pushed to {} subscribers", inner.subscribers.len());
        inner.subscribers.len()
    }

    /// Update the directory and push the new position.
    ///
    pub fn push_position(&self, key: &EntityKey, position: Position) -> usize {
        self.update_position(key, position);
        self.push(PushEvent::Position(PositionUpdate {
            key: key.clone(),
            position,
        }))
    }

    pub fn heartbeat(&self) -> usize {
        self.push(PushEvent::Heartbeat)
    }

    /// Fail every open stream and forget about it.
    ///
    pub fn break_stream(&self) {
        let mut inner = self.inner.lock();
        debug!("{}: breaking {} streams", self.name, inner.subscribers.len());
        for tx in inner.subscribers.drain(..) {
            let _ = tx.unbounded_send(Err(SourceError::Closed(self.name.clone())));
        }
    }

    pub fn set_refuse_subscribe(&self, refuse: bool) {
        self.inner.lock().refuse_subscribe = refuse;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.inner.lock().fail_fetch = fail;
    }

    /// Number of bulk reads served so far, failed ones included.
    ///
    pub fn fetch_count(&self) -> usize {
        self.inner.lock().fetches
    }

    /// Number of successful subscriptions so far.
    ///
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions
    }

    /// Subscribers still listening.
    ///
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

/// Does `e` pass `filter`?
///
fn passes(e: &TrackedEntity, filter: &Filter) -> bool {
    match filter {
        Filter::None => true,
        Filter::Region { region } => e
            .region
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(region)),
        Filter::Ids { ids } => ids.iter().any(|id| *id == e.id),
        Filter::Around { lat, lng, radius_km } => match e.known_position() {
            Some(p) => {
                let center = Position {
                    lat: *lat,
                    lng: *lng,
                    captured_at: p.captured_at,
                };
                distance_km(&center, p) <= *radius_km
            }
            None => false,
        },
    }
}

#[async_trait]
impl Fetchable for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_entities(
        &self,
        kind: EntityKind,
        filter: &Filter,
    ) -> Result<Vec<TrackedEntity>, SourceError> {
        let mut inner = self.inner.lock();
        inner.fetches += 1;
        if inner.fail_fetch {
            return Err(SourceError::Http(format!("{}: fetch refused", self.name)));
        }
        let list: Vec<TrackedEntity> = inner
            .entities
            .values()
            .filter(|e| e.kind() == kind && passes(e, filter))
            .cloned()
            .collect();
        debug!("{} entities", list.len());
        Ok(list)
    }
}

#[async_trait]
impl Streamable for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe(&self, scope: &Scope) -> Result<PushStream, SourceError> {
        let mut inner = self.inner.lock();
        if inner.refuse_subscribe {
            return Err(SourceError::Refused(self.name.clone()));
        }
        let (tx, rx) = unbounded();
        inner.subscribers.push(tx);
        inner.subscriptions += 1;
        debug!("new subscriber for {scope}");
        Ok(rx.boxed())
    }
}
