//! Entry point of the engine.
//!
//! A `Tracker` holds the configuration and the two sources, and starts independent sessions.
//! Route synthesis lives here too as it needs the sources to resolve ids and port names.
//!
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use seawatch_common::{EntityKey, EntityKind, Position, TrackedEntity};
use seawatch_sources::{Fetchable, Filter, RestSource, Scope, Streamable, WsSource};

use crate::{
    nearest_by_name, route, Board, EngineConfig, EngineError, FeedCoordinator, FeedStore,
    HotSetSelector, RenderScheduler, RouteWaypoint, SessionHandle,
};

pub struct Tracker {
    config: EngineConfig,
    fetch: Arc<dyn Fetchable>,
    stream: Arc<dyn Streamable>,
}

impl Debug for Tracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("fetch", &self.fetch.name())
            .field("stream", &self.stream.name())
            .finish()
    }
}

impl Tracker {
    /// Use whatever sources the caller provides.
    ///
    pub fn new(
        config: EngineConfig,
        fetch: Arc<dyn Fetchable>,
        stream: Arc<dyn Streamable>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Tracker {
            config,
            fetch,
            stream,
        })
    }

    /// REST + WebSocket sources built from the `site` block.
    ///
    pub fn from_site(config: EngineConfig) -> Result<Self, EngineError> {
        let site = config.site.clone().ok_or(EngineError::NoSiteDefined)?;
        info!("using site {site}");

        let fetch = Arc::new(RestSource::new(&site)?);
        let stream = Arc::new(WsSource::new(&site));
        Self::new(config, fetch, stream)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start tracking everything within `radius_km` of `subject`.
    ///
    /// Must be called from within a tokio runtime.  The only errors are configuration ones,
    /// transport problems are dealt with by the session itself.
    ///
    #[tracing::instrument(skip(self))]
    pub fn start_session(
        &self,
        subject: EntityKey,
        radius_km: f64,
        selector: HotSetSelector,
    ) -> Result<SessionHandle, EngineError> {
        if !radius_km.is_finite() || radius_km < 0. {
            return Err(EngineError::InvalidRadius(radius_km));
        }
        let rt = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let board = Arc::new(RwLock::new(Board::new(FeedStore::new(
            self.config.feed.staleness,
        ))));
        let (tx, _) = watch::channel(0u64);
        let trigger = Arc::new(tx);
        let cancel = CancellationToken::new();

        let handle = SessionHandle::new(
            subject.clone(),
            radius_km,
            self.config.markers.clone(),
            selector,
            board.clone(),
            trigger.clone(),
            cancel.clone(),
        );

        // render first so it does not miss the first notification
        //
        handle.spawn_render(&rt, RenderScheduler::from(&self.config.render));

        let coord = FeedCoordinator::new(
            Scope::new(subject, radius_km),
            self.config.feed.clone(),
            self.fetch.clone(),
            self.stream.clone(),
            board,
            trigger,
            cancel,
        );
        handle.adopt(rt.spawn(coord.run()));

        debug!("session started");
        Ok(handle)
    }

    /// Route from `origin` to `destination` through the current position of `subject`, all
    /// three resolved through the bulk source.  `None` when one of them is not found or has no
    /// usable position.
    ///
    #[tracing::instrument(skip(self))]
    pub async fn synthesize_route(
        &self,
        origin: &EntityKey,
        subject: &EntityKey,
        destination: &EntityKey,
    ) -> Option<Vec<RouteWaypoint>> {
        let origin = self.locate(origin).await?;
        let live = self.locate(subject).await?;
        let destination = self.locate(destination).await?;
        Some(route::synthesize(&origin, &live, &destination))
    }

    /// Route for a vessel using its free-text departure and destination ports.
    ///
    #[tracing::instrument(skip(self, vessel), fields(vessel = %vessel))]
    pub async fn route_for_vessel(&self, vessel: &TrackedEntity) -> Option<Vec<RouteWaypoint>> {
        let info = vessel.vessel_info()?;
        let live = vessel.known_position()?;
        let (from, to) = (info.departure.as_deref()?, info.destination.as_deref()?);

        let ports = match self.fetch.fetch_entities(EntityKind::Port, &Filter::None).await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("port directory: {e}");
                return None;
            }
        };

        let origin = nearest_by_name(from, &ports)?.known_position()?;
        let destination = nearest_by_name(to, &ports)?.known_position()?;
        trace!("{from} -> {to} resolved");
        Some(route::synthesize(origin, live, destination))
    }

    async fn locate(&self, key: &EntityKey) -> Option<Position> {
        let filter = Filter::ids(&[key.id.as_str()]);
        match self.fetch.fetch_entities(key.kind, &filter).await {
            Ok(list) => list
                .iter()
                .find(|e| e.id == key.id)
                .and_then(|e| e.known_position().copied()),
            Err(e) => {
                warn!("can not locate {key}: {e}");
                None
            }
        }
    }
}
