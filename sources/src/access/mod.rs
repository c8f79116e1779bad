//! Access methods, one per transport.
//!
pub use memory::*;
#[cfg(feature = "rest")]
pub use rest::*;
#[cfg(feature = "ws")]
pub use ws::*;

mod memory;
#[cfg(feature = "rest")]
mod rest;
#[cfg(feature = "ws")]
mod ws;

