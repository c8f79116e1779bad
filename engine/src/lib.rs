//! Processing core of seawatch.
//!
//! - `within()`/`nearest_by_name()`: who is near what, pure functions over a snapshot,
//! - `FeedCoordinator`: live positions from a push channel with a polling fallback,
//! - `RenderScheduler`: paced delivery of a candidate list, hot set first,
//! - `route::synthesize()`: coarse route through known chokepoints,
//! - `Tracker`/`SessionHandle`: what consumers actually use.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use seawatch_common::EntityKey;
//! use seawatch_engine::{EngineConfig, HotSetSelector, Tracker};
//! use seawatch_sources::MemorySource;
//!
//! # async fn demo() -> eyre::Result<()> {
//! let src = MemorySource::default();
//! let tracker = Tracker::new(EngineConfig::default(), Arc::new(src.clone()), Arc::new(src))?;
//! let session = tracker.start_session(EntityKey::vessel("9321483"), 50., HotSetSelector::Nothing)?;
//! session.on_batch(|batch| println!("{} markers", batch.len()));
//! # Ok(())
//! # }
//! ```
//!
pub use config::*;
pub use error::*;
pub use feed::*;
pub use hot::*;
pub use proximity::*;
pub use render::*;
pub use route::{chokepoints, RouteWaypoint};
pub use session::*;
pub use tracker::*;

mod config;
mod error;
mod feed;
mod hot;
mod proximity;
mod render;
pub mod route;
mod session;
mod tracker;

const NAME: &str = env!("CARGO_PKG_NAME");
const EVERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> String {
    format!("{}/{}", NAME, EVERSION)
}
