//! Paced delivery of a candidate list.
//!
//! A scheduling run is split in two steps:
//!
//! - `plan()` is pure: hot entries first, the rest in input order, capped and cut in batches,
//! - `run()` hands the batches to a sink, the first one right away, then one every
//!   `batch_delay`, and stops as soon as the token is cancelled or the sink says it is gone.
//!
//! Nothing is carried from one run to the next, entries beyond the cap are simply dropped.
//!
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::RenderConfig;

#[derive(Clone, Debug)]
pub struct RenderScheduler {
    batch_size: usize,
    batch_delay: Duration,
    cap: usize,
}

/// What happened during one `run()`.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunOutcome {
    /// Batches handed to the sink
    pub batches: usize,
    /// Entries in those batches
    pub delivered: usize,
    /// Run stopped before the last batch
    pub cancelled: bool,
}

impl From<&RenderConfig> for RenderScheduler {
    fn from(cfg: &RenderConfig) -> Self {
        RenderScheduler::new(cfg.batch_size, cfg.batch_delay, cfg.max_per_run)
    }
}

impl RenderScheduler {
    pub fn new(batch_size: usize, batch_delay: Duration, cap: usize) -> Self {
        RenderScheduler {
            batch_size: batch_size.max(1),
            batch_delay,
            cap,
        }
    }

    /// Cut `candidates` into batches.
    ///
    /// The first batch holds every hot entry, even when there are more of them than
    /// `batch_size` or the cap, then is topped up with the others.  Others only fill what the
    /// hot set left of the cap.
    ///
    pub fn plan<T, F>(&self, candidates: &[T], is_hot: F) -> Vec<Vec<T>>
    where
        T: Clone,
        F: Fn(&T) -> bool,
    {
        let (hot, others): (Vec<&T>, Vec<&T>) = candidates.iter().partition(|c| is_hot(c));

        let room = self.cap.saturating_sub(hot.len());
        let fill = self.batch_size.saturating_sub(hot.len());
        let mut others = others.into_iter().take(room).cloned();

        let mut first: Vec<T> = hot.into_iter().cloned().collect();
        first.extend(others.by_ref().take(fill));

        let rest: Vec<T> = others.collect();

        let mut batches = Vec::with_capacity(1 + rest.len() / self.batch_size);
        if !first.is_empty() {
            batches.push(first);
        }
        batches.extend(rest.chunks(self.batch_size).map(|c| c.to_vec()));

        trace!("{} candidates in {} batches", candidates.len(), batches.len());
        batches
    }

    /// Deliver `batches` to `sink`.  `sink` returns `false` when nobody is listening anymore,
    /// which ends the run like a cancellation.
    ///
    pub async fn run<T, F>(
        &self,
        batches: Vec<Vec<T>>,
        mut sink: F,
        cancel: &CancellationToken,
    ) -> RunOutcome
    where
        F: FnMut(Vec<T>) -> bool,
    {
        let total = batches.len();
        let mut outcome = RunOutcome::default();

        for (i, batch) in batches.into_iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        break;
                    }
                    _ = sleep(self.batch_delay) => (),
                }
            }
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let n = batch.len();
            if !sink(batch) {
                outcome.cancelled = true;
                break;
            }
            outcome.batches += 1;
            outcome.delivered += n;
        }

        debug!(
            "run: {}/{} batches, {} entries, cancelled={}",
            outcome.batches, total, outcome.delivered, outcome.cancelled
        );
        outcome
    }
}
