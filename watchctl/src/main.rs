use std::io;

use clap::{crate_authors, crate_description, crate_version, CommandFactory, Parser};
use clap_complete::generate;
use eyre::Result;
use tracing::{info, trace};

use seawatch_common::init_logging;
use seawatch_engine::{EngineConfig, Tracker};
use watchctl::{list_chokepoints, route_through, watch_subject, ListSubCommand, Opts, SubCommand};

/// Binary name, using a different binary name
pub const NAME: &str = env!("CARGO_BIN_NAME");
/// Binary version
pub const VERSION: &str = crate_version!();
/// Authors
pub const AUTHORS: &str = crate_authors!();

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    init_logging(NAME, opts.tree, opts.log_dir.clone())?;

    // Commands needing neither configuration nor network
    //
    match &opts.subcmd {
        // NOTE: you can generate UNIX shells completion on Windows and vice-versa.
        //
        SubCommand::Completion(copts) => {
            generate(copts.shell, &mut Opts::command(), NAME, &mut io::stdout());
            return Ok(());
        }
        SubCommand::List(lopts) => match lopts.cmd {
            ListSubCommand::Chokepoints => {
                info!("Listing all chokepoints:");
                eprintln!("{}", list_chokepoints());
                return Ok(());
            }
        },
        SubCommand::Version => {
            eprintln!("Modules: ");
            eprintln!("\t{}", version());
            eprintln!("\t{}", seawatch_common::version());
            eprintln!("\t{}", seawatch_engine::version());
            return Ok(());
        }
        _ => (),
    }

    banner()?;

    let cfg = EngineConfig::load(opts.config.as_deref())?;
    let tracker = Tracker::from_site(cfg)?;
    trace!("{tracker:?}");

    match &opts.subcmd {
        SubCommand::Watch(wopts) => watch_subject(&tracker, wopts).await,
        SubCommand::Route(ropts) => {
            let table = route_through(&tracker, ropts).await?;
            println!("{table}");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Return our version number
///
#[inline]
pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}

/// Display banner
///
fn banner() -> Result<()> {
    Ok(eprintln!(
        r##"
{}/{} by {}
{}
"##,
        NAME,
        VERSION,
        AUTHORS,
        crate_description!()
    ))
}
