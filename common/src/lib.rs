//! This library is there to share some common code amongst all seawatch modules.
//!
//! - `Position`, `TrackedEntity` and friends describe what we are tracking,
//! - `distance_km()` and `BB` are the geodesic primitives,
//! - `ConfigFile` and `init_logging()` are the ambient plumbing used by every crate.
//!

mod config;
mod duration;
mod entity;
mod error;
mod geo;
mod logging;
mod position;

pub use config::*;
pub use duration::*;
pub use entity::*;
pub use error::*;
pub use geo::*;
pub use logging::*;
pub use position::*;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}
