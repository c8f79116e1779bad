//! What each sub-command actually does.
//!
use std::io::{self, Write};

use eyre::{eyre, Result};
use tabled::builder::Builder;
use tabled::settings::Style;
use tokio::time::sleep;
use tracing::{info, trace, warn};

use seawatch_engine::{chokepoints, HotSetSelector, ProximityResult, RouteWaypoint, Tracker};

use crate::{RouteOpts, WatchOpts};

/// Follow the subject until interrupted or for the requested duration.
///
#[tracing::instrument(skip(tracker))]
pub async fn watch_subject(tracker: &Tracker, opts: &WatchOpts) -> Result<()> {
    let selector = if opts.hot.is_empty() {
        HotSetSelector::Nothing
    } else {
        HotSetSelector::ids(opts.hot.iter().cloned())
    };

    let session = tracker.start_session(opts.subject.clone(), opts.radius, selector)?;
    session.on_batch(print_batch);

    match opts.duration {
        Some(d) => sleep(d).await,
        None => tokio::signal::ctrl_c().await?,
    }

    info!("{} done, {}", opts.subject, session.stats());
    session.teardown();
    Ok(())
}

/// One JSON array per line.
///
fn print_batch(batch: &[ProximityResult]) {
    match serde_json::to_string(batch) {
        Ok(s) => {
            let mut out = io::stdout().lock();
            if let Err(e) = writeln!(out, "{s}") {
                warn!("stdout: {e}");
            }
        }
        Err(e) => warn!("can not encode batch: {e}"),
    }
}

#[tracing::instrument(skip(tracker))]
pub async fn route_through(tracker: &Tracker, opts: &RouteOpts) -> Result<String> {
    let route = tracker
        .synthesize_route(&opts.origin, &opts.subject, &opts.destination)
        .await
        .ok_or_else(|| eyre!("no route, one of the three has no known position"))?;
    Ok(waypoint_table(&route))
}

pub fn list_chokepoints() -> String {
    trace!("list_chokepoints");
    waypoint_table(&chokepoints())
}

fn waypoint_table(list: &[RouteWaypoint]) -> String {
    let header = vec!["Name", "Latitude", "Longitude"];

    let mut builder = Builder::default();
    builder.push_record(header);

    for w in list {
        builder.push_record(vec![
            w.name.clone(),
            format!("{:.4}", w.lat),
            format!("{:.4}", w.lng),
        ]);
    }

    let allf = builder.build().with(Style::modern()).to_string();
    format!("{} waypoints\n{allf}", list.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_chokepoints() {
        let s = list_chokepoints();
        assert!(s.starts_with("4 waypoints"));
        assert!(s.contains("Suez Canal"));
        assert!(s.contains("103.8000"));
    }
}
