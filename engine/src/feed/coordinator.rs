//! The feed coordinator, one task per session.
//!
//! ```text
//! Disconnected -> Connecting -> Live <-> Degraded -> Disconnected
//!                      \________________/
//! ```
//!
//! - `Connecting`: we subscribe to the push channel right away, directories and one poll for
//!   the initial positions run alongside and never hold the state machine back,
//! - `Live`: every push event goes to the board, silence for more than twice the heartbeat or
//!   any transport error means `Degraded`,
//! - `Degraded`: the same scope is polled every `poll_interval`, the push channel is retried on
//!   its own exponential backoff and only a successful subscription brings us back to `Live`.
//!
//! Cancellation is checked around every await so nothing lands on the board once the session
//! has been torn down.  After every sweep, vessels that moved out of the radius are forgotten.
//!
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::{interval, sleep, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use seawatch_common::{EntityKind, TrackedEntity};
use seawatch_sources::{
    Fetchable, Filter, PositionUpdate, PushEvent, PushStream, Scope, SourceError, Streamable,
};

use crate::{Backoff, Board, FeedConfig, SessionStatus, UpdateSource};

/// Directories loaded once at startup.
///
const DIRECTORIES: [EntityKind; 2] = [EntityKind::Port, EntityKind::Refinery];

enum Mode {
    Connecting,
    Live(PushStream),
    Degraded,
    Exit,
}

enum Attempt {
    Connected(PushStream),
    Failed,
    Cancelled,
}

pub struct FeedCoordinator {
    scope: Scope,
    config: FeedConfig,
    fetch: Arc<dyn Fetchable>,
    stream: Arc<dyn Streamable>,
    board: Arc<RwLock<Board>>,
    /// Bumped every time the board changes in a way worth rendering
    notify: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
}

impl FeedCoordinator {
    pub fn new(
        scope: Scope,
        config: FeedConfig,
        fetch: Arc<dyn Fetchable>,
        stream: Arc<dyn Streamable>,
        board: Arc<RwLock<Board>>,
        notify: Arc<watch::Sender<u64>>,
        cancel: CancellationToken,
    ) -> Self {
        FeedCoordinator {
            scope,
            config,
            fetch,
            stream,
            board,
            notify,
            cancel,
        }
    }

    /// Main loop, returns when the session is cancelled.
    ///
    #[tracing::instrument(skip(self), fields(scope = %self.scope))]
    pub async fn run(self) {
        info!(
            "feed starting, fetch={} stream={}",
            self.fetch.name(),
            self.stream.name()
        );
        self.set_status(SessionStatus::Connecting);

        // the push channel does not wait for directories and the first poll
        //
        tokio::join!(self.prime(), self.drive());

        self.set_status(SessionStatus::Disconnected);
        info!("feed stopped, {}", self.board.read().stats);
    }

    /// The mode state machine, from the first subscription attempt to cancellation.
    ///
    async fn drive(&self) {
        let mut mode = Mode::Connecting;
        let mut backoff = Backoff::new(self.config.reconnect_min, self.config.reconnect_max);

        loop {
            mode = match mode {
                Mode::Connecting => match self.subscribe().await {
                    Attempt::Connected(stream) => {
                        self.set_status(SessionStatus::Live);
                        Mode::Live(stream)
                    }
                    Attempt::Failed => Mode::Degraded,
                    Attempt::Cancelled => Mode::Exit,
                },
                Mode::Live(stream) => self.live(stream).await,
                Mode::Degraded => self.degraded(&mut backoff).await,
                Mode::Exit => break,
            };
        }
    }

    /// Load directories and get a first set of positions.
    ///
    async fn prime(&self) {
        for kind in DIRECTORIES {
            match self.bulk(kind, &Filter::None).await {
                None => return,
                Some(Ok(list)) => {
                    debug!("{} {kind} entities in directory", list.len());
                    self.board.write().load_directory(list);
                }
                Some(Err(e)) => self.transport_error("directory", &e),
            }
        }
        if self.poll().await {
            self.bump();
        }
    }

    /// One attempt at the push channel.
    ///
    async fn subscribe(&self) -> Attempt {
        let wait = self.config.connect_timeout;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Attempt::Cancelled,
            r = timeout(wait, self.stream.subscribe(&self.scope)) => match r {
                Ok(Ok(stream)) => {
                    info!("subscribed to {}", self.stream.name());
                    Attempt::Connected(stream)
                }
                Ok(Err(e)) => {
                    self.transport_error("subscribe", &e);
                    Attempt::Failed
                }
                Err(_) => {
                    let e = SourceError::Timeout(wait.as_millis());
                    self.transport_error("subscribe", &e);
                    Attempt::Failed
                }
            },
        }
    }

    /// Consume the push channel until it fails or goes quiet.
    ///
    async fn live(&self, mut stream: PushStream) -> Mode {
        let patience = self.config.push_timeout();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Mode::Exit,
                ev = timeout(patience, stream.next()) => match ev {
                    Err(_) => {
                        warn!("nothing on push channel for {patience:?}");
                        return Mode::Degraded;
                    }
                    Ok(None) => {
                        warn!("push channel closed");
                        return Mode::Degraded;
                    }
                    Ok(Some(Err(SourceError::Decode(e)))) => {
                        warn!("undecodable push event: {e}");
                        self.board.write().stats.err += 1;
                    }
                    Ok(Some(Err(e))) => {
                        self.transport_error("push", &e);
                        return Mode::Degraded;
                    }
                    Ok(Some(Ok(PushEvent::Heartbeat))) => {
                        trace!("heartbeat");
                        let mut board = self.board.write();
                        board.stats.heartbeats += 1;
                        board.store.sweep(Instant::now());
                        drop(board);
                        self.tidy();
                    }
                    Ok(Some(Ok(PushEvent::Position(update)))) => self.on_push(update),
                },
            }
        }
    }

    fn on_push(&self, update: PositionUpdate) {
        let applied = {
            let mut board = self.board.write();
            board.stats.pushed += 1;
            board.apply(&update.key, update.position, UpdateSource::Push, Instant::now())
        };
        if applied.is_update() {
            self.bump();
        }
    }

    /// Poll on a fixed cadence, try the push channel again on a slower one.
    ///
    async fn degraded(&self, backoff: &mut Backoff) -> Mode {
        self.set_status(SessionStatus::Degraded);

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let first = backoff.next_delay();
        debug!("next push attempt in {first:?}");
        let retry = sleep(first);
        tokio::pin!(retry);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Mode::Exit,
                _ = &mut retry => match self.subscribe().await {
                    Attempt::Connected(stream) => {
                        backoff.reset();
                        self.board.write().stats.reconnect += 1;
                        self.set_status(SessionStatus::Live);
                        return Mode::Live(stream);
                    }
                    Attempt::Failed => {
                        let delay = backoff.next_delay();
                        debug!("next push attempt in {delay:?}");
                        retry.as_mut().reset(Instant::now() + delay);
                    }
                    Attempt::Cancelled => return Mode::Exit,
                },
                _ = ticker.tick() => {
                    if !self.poll().await {
                        return Mode::Exit;
                    }
                }
            }
        }
    }

    /// One polling round: the subject first, then its neighbourhood.  Returns `false` if
    /// cancelled midway.
    ///
    async fn poll(&self) -> bool {
        let subject = &self.scope.subject;
        self.board.write().stats.polls += 1;

        match self.bulk(subject.kind, &self.scope.subject_filter()).await {
            None => return false,
            Some(Ok(list)) => self.merge(list),
            Some(Err(e)) => self.transport_error("poll", &e),
        }

        let center = self.board.read().center(subject);
        match center {
            Some(center) => {
                let filter = self.scope.area_filter(&center);
                for kind in self.scope.kinds.iter() {
                    match self.bulk(*kind, &filter).await {
                        None => return false,
                        Some(Ok(list)) => self.merge(list),
                        Some(Err(e)) => self.transport_error("poll", &e),
                    }
                }
            }
            None => debug!("{subject} has no position yet"),
        }

        self.board.write().store.sweep(Instant::now());
        self.tidy();
        true
    }

    /// Forget mobile entities that left the scope.
    ///
    fn tidy(&self) {
        let subject = &self.scope.subject;
        let dropped = {
            let mut board = self.board.write();
            match board.center(subject) {
                Some(center) => board.prune(subject, &center, self.scope.radius_km),
                None => 0,
            }
        };
        if dropped > 0 {
            debug!("{dropped} entities out of scope");
            self.bump();
        }
    }

    /// Bulk read racing against cancellation, `None` means cancelled.
    ///
    async fn bulk(
        &self,
        kind: EntityKind,
        filter: &Filter,
    ) -> Option<Result<Vec<TrackedEntity>, SourceError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            r = self.fetch.fetch_entities(kind, filter) => Some(r),
        }
    }

    fn merge(&self, list: Vec<TrackedEntity>) {
        let n = self
            .board
            .write()
            .merge(list, UpdateSource::Poll, Instant::now());
        trace!("{n} positions updated by poll");
        if n > 0 {
            self.bump();
        }
    }

    fn transport_error(&self, what: &str, e: &SourceError) {
        warn!("{what}: {e}");
        self.board.write().stats.err += 1;
    }

    fn set_status(&self, status: SessionStatus) {
        let mut board = self.board.write();
        if !board.is_closed() {
            board.set_status(status);
        }
    }

    fn bump(&self) {
        if !self.cancel.is_cancelled() {
            self.notify.send_modify(|n| *n = n.wrapping_add(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use seawatch_common::{EntityKey, Position};
    use seawatch_sources::MemorySource;

    use super::*;
    use crate::FeedStore;

    struct Harness {
        src: MemorySource,
        board: Arc<RwLock<Board>>,
        rx: watch::Receiver<u64>,
        cancel: CancellationToken,
        handle: tokio::task::JoinHandle<()>,
    }

    fn start(src: &MemorySource) -> Harness {
        let config = FeedConfig::default();
        let board = Arc::new(RwLock::new(Board::new(FeedStore::new(config.staleness))));
        let (tx, rx) = watch::channel(0);
        let cancel = CancellationToken::new();
        let coord = FeedCoordinator::new(
            Scope::new(EntityKey::vessel("1"), 50.),
            config,
            Arc::new(src.clone()),
            Arc::new(src.clone()),
            board.clone(),
            Arc::new(tx),
            cancel.clone(),
        );
        let handle = tokio::spawn(coord.run());
        Harness {
            src: src.clone(),
            board,
            rx,
            cancel,
            handle,
        }
    }

    fn fleet() -> MemorySource {
        MemorySource::default().with([
            TrackedEntity::vessel("1", "Subject").at(Position::now(25.2, 55.3).unwrap()),
            TrackedEntity::vessel("2", "Neighbour").at(Position::now(25.3, 55.4).unwrap()),
            TrackedEntity::port("P", "Jebel Ali").at(Position::now(25.01, 55.06).unwrap()),
        ])
    }

    fn status(h: &Harness) -> SessionStatus {
        h.board.read().status
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinator_goes_live() {
        let mut h = start(&fleet());
        sleep(Duration::from_millis(10)).await;

        assert_eq!(SessionStatus::Live, status(&h));
        {
            let board = h.board.read();
            assert_eq!(2, board.store.len());
            assert!(board.roster.contains_key(&EntityKey::port("P")));
            assert_eq!(1, board.stats.polls);
        }
        assert!(*h.rx.borrow() > 0);

        let p = Position::now(25.25, 55.35).unwrap();
        h.src.push_position(&EntityKey::vessel("2"), p);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(
            Some(p),
            h.board.read().store.position(&EntityKey::vessel("2"))
        );

        h.cancel.cancel();
        (&mut h.handle).await.unwrap();
        assert_eq!(SessionStatus::Disconnected, status(&h));
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinator_silence_means_degraded() {
        let h = start(&fleet());
        sleep(Duration::from_millis(10)).await;
        assert_eq!(SessionStatus::Live, status(&h));

        // heartbeats keep it alive
        //
        for _ in 0..3 {
            sleep(Duration::from_secs(6)).await;
            h.src.heartbeat();
        }
        sleep(Duration::from_millis(10)).await;
        assert_eq!(SessionStatus::Live, status(&h));

        sleep(Duration::from_secs(11)).await;
        assert_eq!(SessionStatus::Degraded, status(&h));
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinator_reconnects_with_backoff() {
        let src = fleet();
        src.set_refuse_subscribe(true);
        let h = start(&src);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(SessionStatus::Degraded, status(&h));

        // first retry at 15s fails, next one is 30s later
        //
        sleep(Duration::from_secs(16)).await;
        assert_eq!(SessionStatus::Degraded, status(&h));
        h.src.set_refuse_subscribe(false);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(SessionStatus::Degraded, status(&h));
        assert_eq!(0, h.src.subscription_count());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(SessionStatus::Live, status(&h));
        assert_eq!(1, h.board.read().stats.reconnect);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinator_cancel_during_poll() {
        let src = fleet();
        src.set_refuse_subscribe(true);
        let h = start(&src);
        sleep(Duration::from_millis(10)).await;

        h.cancel.cancel();
        h.handle.await.unwrap();
        let n = h.src.fetch_count();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(n, h.src.fetch_count());
    }
}
