//! A tracking session and the handle given to its consumer.
//!
//! A session runs two tasks sharing one `Board`:
//!
//! - the `FeedCoordinator`, sole writer of the board,
//! - the render task, waiting for the coordinator to say something changed, then computing the
//!   proximity set from a copy of the board and handing it to the `RenderScheduler`.
//!
//! Changes arriving during a run are coalesced into the next one.  `teardown()` cancels both
//! tasks, closes the board and unhooks the callback; once it returns the callback is never
//! called again.
//!
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use strum::IntoEnumIterator;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use seawatch_common::{EntityKey, EntityKind, TrackedEntity};
use seawatch_sources::Stats;

use crate::{
    by_distance, within, Board, FeedState, HotSetSelector, MarkerConfig, ProximityOptions,
    ProximityResult, RenderScheduler, SessionStatus,
};

type Callback = Box<dyn FnMut(&[ProximityResult]) + Send>;

/// Where batches go.
///
/// The callback is only ever called with the slot locked, so taking the lock in `close()`
/// waits for a callback in progress.  A callback calling back into its own session would
/// deadlock on that, hence `running` to recognise the thread and `pending` to park a
/// replacement callback until the current one returns.
///
#[derive(Default)]
struct Sink {
    slot: Mutex<Option<Callback>>,
    pending: Mutex<Option<Callback>>,
    closed: AtomicBool,
    running: Mutex<Option<ThreadId>>,
}

impl Sink {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn in_callback(&self) -> bool {
        *self.running.lock() == Some(thread::current().id())
    }

    fn set(&self, cb: Callback) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.in_callback() {
            *self.pending.lock() = Some(cb);
            return true;
        }
        let mut slot = self.slot.lock();
        if self.is_closed() {
            return false;
        }
        *slot = Some(cb);
        true
    }

    fn is_armed(&self) -> bool {
        !self.is_closed() && self.slot.lock().is_some()
    }

    /// Hand one batch over, `false` if there is nobody to hand it to.
    ///
    fn deliver(&self, batch: &[ProximityResult]) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut slot = self.slot.lock();
        if self.is_closed() {
            return false;
        }
        let Some(cb) = slot.as_mut() else {
            return false;
        };

        *self.running.lock() = Some(thread::current().id());
        cb(batch);
        *self.running.lock() = None;

        if let Some(next) = self.pending.lock().take() {
            *slot = Some(next);
        }
        true
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.pending.lock().take();
        if self.in_callback() {
            trace!("closing from within the callback");
            return;
        }
        self.slot.lock().take();
    }
}

/// What the render task needs to compute a proximity set.
///
#[derive(Clone)]
struct View {
    subject: EntityKey,
    radius_km: f64,
    markers: MarkerConfig,
    selector: HotSetSelector,
    board: Arc<RwLock<Board>>,
}

impl View {
    /// Closest entities of each kind, merged and sorted.  Marker limits only apply to what is
    /// not hot, the hot set always makes it through.
    ///
    fn candidates(&self) -> Vec<ProximityResult> {
        let (center, subject, entities) = {
            let board = self.board.read();
            let Some(center) = board.center(&self.subject) else {
                trace!("{} not located yet", self.subject);
                return vec![];
            };
            let subject = board
                .roster
                .get(&self.subject)
                .cloned()
                .unwrap_or_else(|| TrackedEntity::placeholder(&self.subject));
            (center, Arc::new(subject), board.entities())
        };

        let mut all: Vec<ProximityResult> = EntityKind::iter()
            .flat_map(|kind| {
                let opts = ProximityOptions::new().subject(subject.clone()).kinds(&[kind]);
                let (hot, rest): (Vec<_>, Vec<_>) =
                    within(&center, &entities, self.radius_km, &opts)
                        .into_iter()
                        .partition(|r| self.selector.is_hot(r));
                let keep = self.markers.limit(kind).unwrap_or(usize::MAX);
                hot.into_iter().chain(rest.into_iter().take(keep))
            })
            .collect();
        all.sort_by(by_distance);
        all
    }
}

/// Handle on a running session, dropping it tears the session down.
///
pub struct SessionHandle {
    view: View,
    sink: Arc<Sink>,
    trigger: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        subject: EntityKey,
        radius_km: f64,
        markers: MarkerConfig,
        selector: HotSetSelector,
        board: Arc<RwLock<Board>>,
        trigger: Arc<watch::Sender<u64>>,
        cancel: CancellationToken,
    ) -> Self {
        SessionHandle {
            view: View {
                subject,
                radius_km,
                markers,
                selector,
                board,
            },
            sink: Arc::new(Sink::default()),
            trigger,
            cancel,
            tasks: Mutex::new(vec![]),
        }
    }

    /// Start the render task on the current runtime.
    ///
    pub(crate) fn spawn_render(&self, rt: &tokio::runtime::Handle, scheduler: RenderScheduler) {
        let view = self.view.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();
        let rx = self.trigger.subscribe();
        let task = rt.spawn(render_loop(view, sink, scheduler, rx, cancel));
        self.adopt(task);
    }

    pub(crate) fn adopt(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    pub fn subject(&self) -> &EntityKey {
        &self.view.subject
    }

    pub fn radius_km(&self) -> f64 {
        self.view.radius_km
    }

    /// Install the consumer callback, called once per batch.  Replaces any previous one and
    /// starts a scheduling run right away.
    ///
    pub fn on_batch<F>(&self, callback: F)
    where
        F: FnMut(&[ProximityResult]) + Send + 'static,
    {
        if self.sink.set(Box::new(callback)) {
            self.trigger.send_modify(|n| *n = n.wrapping_add(1));
        }
    }

    /// Current proximity set, computed on the spot.
    ///
    pub fn snapshot(&self) -> Vec<ProximityResult> {
        self.view.candidates()
    }

    /// Live state of every entity heard of, staleness resolved now.
    ///
    pub fn current_positions(&self) -> BTreeMap<EntityKey, FeedState> {
        self.view.board.read().store.snapshot(Instant::now())
    }

    pub fn status(&self) -> SessionStatus {
        self.view.board.read().status
    }

    pub fn stats(&self) -> Stats {
        self.view.board.read().stats.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop everything.  Safe to call more than once.
    ///
    pub fn teardown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        info!("teardown {}", self.view.subject);
        self.cancel.cancel();
        self.sink.close();
        self.view.board.write().close();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn render_loop(
    view: View,
    sink: Arc<Sink>,
    scheduler: RenderScheduler,
    mut rx: watch::Receiver<u64>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = rx.changed() => if r.is_err() { break },
        }
        let generation = *rx.borrow_and_update();

        if !sink.is_armed() {
            trace!("nobody listening, skipping run {generation}");
            continue;
        }

        let candidates = view.candidates();
        let batches = scheduler.plan(&candidates, |r| view.selector.is_hot(r));
        debug!(
            "run {generation}: {} candidates, {} batches",
            candidates.len(),
            batches.len()
        );
        scheduler
            .run(batches, |batch| sink.deliver(&batch), &cancel)
            .await;
    }
    trace!("render loop done");
}
