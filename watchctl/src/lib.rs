//! Library part of the `watchctl` utility.
//!
//! The command-line definitions live in `cli`, the actual work in `cmds`; `main.rs` only loads
//! the configuration, sets logging up and dispatches.
//!
pub use cli::*;
pub use cmds::*;

mod cli;
mod cmds;
