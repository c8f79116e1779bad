//! Module to deal with the different kinds of sources we get entities and positions from.
//!
//! There are two ways of getting data, each with its own trait:
//!
//! - `Fetchable`: bulk read of entities, REST-shaped, used for directories (ports, refineries)
//!   and for the polling fallback,
//! - `Streamable`: push subscription returning a stream of `PushEvent`, WebSocket-shaped.
//!
//! `RestSource` and `WsSource` talk to a real backend described by a `Site`, `MemorySource` keeps
//! everything in-process and is used for tests and demos.
//!
use std::fmt::{Debug, Display, Formatter};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use seawatch_common::{EntityKey, EntityKind, Position, TrackedEntity};

// Re-export these modules for a shorter import path.
//
pub use access::*;
pub use error::*;
pub use filter::*;
pub use site::*;

mod access;
mod error;
mod filter;
mod site;

/// One position report received from a push channel.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub key: EntityKey,
    pub position: Position,
}

/// What a push channel can send us.  Heartbeats carry no data but prove the channel is alive.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushEvent {
    Position(PositionUpdate),
    Heartbeat,
}

/// Stream returned by a push subscription.  The stream ending or yielding an error both mean the
/// channel is gone.
///
pub type PushStream = BoxStream<'static, Result<PushEvent, SourceError>>;

/// This trait enables us to manage different ways of doing bulk reads under a single interface.
///
#[async_trait]
pub trait Fetchable: Debug + Send + Sync {
    /// Return site's name
    fn name(&self) -> String;
    /// Fetch all entities of one kind matching `filter`
    async fn fetch_entities(
        &self,
        kind: EntityKind,
        filter: &Filter,
    ) -> Result<Vec<TrackedEntity>, SourceError>;
}

/// This trait enables us to manage different push channels under a single interface.
///
#[async_trait]
pub trait Streamable: Debug + Send + Sync {
    /// Return site's name
    fn name(&self) -> String;
    /// Open a subscription for the given scope
    async fn subscribe(&self, scope: &Scope) -> Result<PushStream, SourceError>;
}

/// Statistics gathering struct, one per tracking session.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Position reports received through the push channel
    pub pushed: u32,
    /// Heartbeats received
    pub heartbeats: u32,
    /// Poll requests sent
    pub polls: u32,
    /// Times we went back to the push channel after a fallback
    pub reconnect: u32,
    /// Updates thrown away because we already had something newer
    pub discarded: u32,
    /// Transport errors
    pub err: u32,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pushed={} heartbeats={} polls={} reconnect={} discarded={} errors={}",
            self.pushed, self.heartbeats, self.polls, self.reconnect, self.discarded, self.err
        )
    }
}

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_event_decode_position() {
        let s = r##"{
            "type": "position",
            "key": {"kind": "vessel", "id": "9321483"},
            "position": {"lat": 25.3, "lng": 56.9, "capturedAt": "2024-03-01T12:00:00Z"}
        }"##;
        let ev: PushEvent = serde_json::from_str(s).unwrap();
        match ev {
            PushEvent::Position(u) => {
                assert_eq!(EntityKey::vessel("9321483"), u.key);
                assert_eq!(56.9, u.position.lng);
            }
            _ => panic!("expected a position"),
        }
    }

    #[test]
    fn test_push_event_decode_heartbeat() {
        let ev: PushEvent = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(PushEvent::Heartbeat, ev);
    }

    #[test]
    fn test_stats_display() {
        let s = Stats {
            pushed: 3,
            err: 1,
            ..Default::default()
        };
        assert_eq!(
            "pushed=3 heartbeats=0 polls=0 reconnect=0 discarded=0 errors=1",
            s.to_string()
        );
    }
}
