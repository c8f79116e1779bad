//! Module describing all possible commands and sub-commands to the `watchctl` main driver
//!
//! - `watch` follows one entity and prints what is around it, one JSON array per batch,
//! - `route` draws a coarse route between two ports through a vessel,
//! - `list` shows static tables,
//! - `completion` is here just to configure the various shells completion system.
//!
//! Entities are given as `kind:id`, a bare id is a vessel.
//!
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, Parser, Subcommand, ValueEnum,
};
use clap_complete::shells::Shell;

use seawatch_common::{EntityKey, EntityKind};

/// CLI options
#[derive(Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// configuration file.
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Hierarchical log output.
    #[clap(short = 'T', long)]
    pub tree: bool,
    /// Also log into hourly files in this directory.
    #[clap(short = 'L', long)]
    pub log_dir: Option<String>,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

// ------

/// All sub-commands:
///
/// `completion SHELL`
/// `list chokepoints`
/// `route ORIGIN SUBJECT DESTINATION`
/// `watch [-r km] [-H key]... [-d duration] SUBJECT`
///
#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// Generate Completion stuff
    Completion(ComplOpts),
    /// List static tables
    List(ListOpts),
    /// Coarse route from origin to destination through a live position
    Route(RouteOpts),
    /// Follow one entity and print its neighbourhood
    Watch(WatchOpts),
    /// List all package versions
    Version,
}

// ------

/// Options for `watch`.
///
#[derive(Debug, Parser)]
pub struct WatchOpts {
    /// Radius in km.
    #[clap(short = 'r', long, default_value = "50")]
    pub radius: f64,
    /// Entities always delivered first, can be repeated.
    #[clap(short = 'H', long = "hot", value_parser = parse_key)]
    pub hot: Vec<EntityKey>,
    /// Stop after that long ("90s", "1h"), run until interrupted otherwise.
    #[clap(short = 'd', long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
    /// Entity to follow.
    #[clap(value_parser = parse_key)]
    pub subject: EntityKey,
}

// ------

/// Options for `route`.
///
#[derive(Debug, Parser)]
pub struct RouteOpts {
    #[clap(value_parser = parse_key)]
    pub origin: EntityKey,
    #[clap(value_parser = parse_key)]
    pub subject: EntityKey,
    #[clap(value_parser = parse_key)]
    pub destination: EntityKey,
}

// ------

/// Options to generate completion files at runtime
///
#[derive(Debug, Parser)]
pub struct ComplOpts {
    #[clap(value_parser)]
    pub shell: Shell,
}

// ------

/// All `list` sub-commands:
///
/// `list chokepoints`
///
#[derive(Debug, Parser)]
pub struct ListOpts {
    #[clap(value_parser)]
    pub cmd: ListSubCommand,
}

/// These are the sub-commands for `list`
///
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, ValueEnum)]
pub enum ListSubCommand {
    /// Maritime chokepoints used for routes
    Chokepoints,
}

/// `vessel:9321483`, `port:AEJEA` or just `9321483`.
///
pub fn parse_key(s: &str) -> Result<EntityKey, String> {
    let (kind, id) = match s.split_once(':') {
        Some((kind, id)) => {
            let kind = EntityKind::from_str(&kind.to_lowercase())
                .map_err(|_| format!("unknown kind {kind}"))?;
            (kind, id)
        }
        None => (EntityKind::Vessel, s),
    };
    let id = id.trim();
    if id.is_empty() {
        return Err("empty id".to_string());
    }
    Ok(EntityKey::new(kind, id))
}
