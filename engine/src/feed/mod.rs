//! Live position acquisition for one session.
//!
//! - `FeedStore` holds the reconciled per-entity state,
//! - `Board` wraps it with the roster of known entities, status and counters,
//! - `FeedCoordinator` drives the push channel and the polling fallback and is the only writer.
//!
use serde::Serialize;
use strum::Display;

pub use backoff::*;
pub use board::*;
pub use coordinator::*;
pub use store::*;

mod backoff;
mod board;
mod coordinator;
mod store;

/// Where a session stands regarding its push channel.
///
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, Serialize)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Live,
    Degraded,
}
