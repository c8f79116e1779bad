//! Engine configuration.
//!
//! Loaded from `seawatch.hcl` through `ConfigFile`, every block is optional and defaults to the
//! values below.
//!
//! ```hcl
//! version = 1
//!
//! feed {
//!   staleness     = "30s"
//!   heartbeat     = "5s"
//!   poll_interval = "10s"
//! }
//!
//! render {
//!   batch_size  = 50
//!   batch_delay = "500ms"
//!   max_per_run = 200
//! }
//!
//! markers {
//!   ports = 15
//! }
//!
//! site {
//!   name       = "fleet"
//!   base_url   = "https://api.example.net/v1"
//!   stream_url = "wss://api.example.net/v1/positions"
//!   auth {
//!     api_key = "..."
//!   }
//! }
//! ```
//!
use std::path::Path;
use std::time::Duration;

use eyre::Result;
use serde::Deserialize;
use tracing::trace;

use seawatch_common::{de_duration, ConfigFile, EntityKind, Versioned};
use seawatch_sources::Site;

use crate::EngineError;

/// Current version of the configuration format
///
pub const CVERSION: usize = 1;

/// Configuration file format
///
#[derive(Clone, Debug, Deserialize)]
pub struct EngineConfig {
    /// Usual check for malformed file
    pub version: usize,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    /// Where to get data from, only needed by `Tracker::from_site()`
    #[serde(default)]
    pub site: Option<Site>,
}

/// Timers of the feed coordinator.
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    /// No update for that long and an entity is flagged stale
    #[serde(deserialize_with = "de_duration")]
    pub staleness: Duration,
    /// Expected heartbeat of the push channel, silence for twice that means it is gone
    #[serde(deserialize_with = "de_duration")]
    pub heartbeat: Duration,
    /// Polling cadence while degraded
    #[serde(deserialize_with = "de_duration")]
    pub poll_interval: Duration,
    /// First delay before trying the push channel again
    #[serde(deserialize_with = "de_duration")]
    pub reconnect_min: Duration,
    /// Reconnect delay is doubled up to this
    #[serde(deserialize_with = "de_duration")]
    pub reconnect_max: Duration,
    #[serde(deserialize_with = "de_duration")]
    pub connect_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            staleness: Duration::from_secs(30),
            heartbeat: Duration::from_secs(5),
            poll_interval: Duration::from_secs(10),
            reconnect_min: Duration::from_secs(15),
            reconnect_max: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl FeedConfig {
    /// Longest silence tolerated on the push channel.
    ///
    #[inline]
    pub fn push_timeout(&self) -> Duration {
        self.heartbeat * 2
    }
}

/// Pacing of the delivery to the consumer.
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Entities per batch
    pub batch_size: usize,
    /// Delay between two batches
    #[serde(deserialize_with = "de_duration")]
    pub batch_delay: Duration,
    /// Hard cap on entities delivered in one run
    pub max_per_run: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            batch_size: 50,
            batch_delay: Duration::from_millis(500),
            max_per_run: 200,
        }
    }
}

/// Optional top-N per kind, closest first.  Unset means no limit: the whole proximity set goes
/// to the render scheduler, which does the pacing and capping.  Hot entities are never cut.
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarkerConfig {
    pub vessels: Option<usize>,
    pub ports: Option<usize>,
    pub refineries: Option<usize>,
}

impl MarkerConfig {
    pub fn limit(&self, kind: EntityKind) -> Option<usize> {
        match kind {
            EntityKind::Vessel => self.vessels,
            EntityKind::Port => self.ports,
            EntityKind::Refinery => self.refineries,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            version: CVERSION,
            feed: FeedConfig::default(),
            render: RenderConfig::default(),
            markers: MarkerConfig::default(),
            site: None,
        }
    }
}

impl Versioned for EngineConfig {
    const VERSION: usize = CVERSION;

    fn version(&self) -> usize {
        self.version
    }
}

impl EngineConfig {
    /// Load and check the configuration file, default location if `fname` is `None`.
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<Self> {
        let cfg = ConfigFile::<EngineConfig>::load(fname)?.into_inner();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Same from a string.
    ///
    pub fn from_hcl(data: &str) -> Result<Self> {
        let cfg = ConfigFile::<EngineConfig>::parse(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Catch values that would make the engine spin or stall.
    ///
    pub fn validate(&self) -> Result<(), EngineError> {
        trace!("validate");

        let bad = |s: &str| Err(EngineError::InvalidConfig(s.to_string()));

        if self.version != CVERSION {
            return Err(EngineError::BadConfigVersion(self.version, CVERSION));
        }
        if self.render.batch_size == 0 {
            return bad("render.batch_size must be > 0");
        }
        if self.render.max_per_run == 0 {
            return bad("render.max_per_run must be > 0");
        }
        let feed = &self.feed;
        if feed.poll_interval.is_zero() {
            return bad("feed.poll_interval must be > 0");
        }
        if feed.heartbeat.is_zero() {
            return bad("feed.heartbeat must be > 0");
        }
        if feed.staleness.is_zero() {
            return bad("feed.staleness must be > 0");
        }
        if feed.connect_timeout.is_zero() {
            return bad("feed.connect_timeout must be > 0");
        }
        if feed.reconnect_min.is_zero() || feed.reconnect_min > feed.reconnect_max {
            return bad("feed.reconnect_min must be > 0 and <= feed.reconnect_max");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use seawatch_sources::Auth;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = EngineConfig::from_hcl("version = 1").unwrap();
        assert_eq!(FeedConfig::default(), cfg.feed);
        assert_eq!(RenderConfig::default(), cfg.render);
        assert_eq!(Duration::from_secs(10), cfg.feed.push_timeout());
        assert_eq!(MarkerConfig::default(), cfg.markers);
        assert_eq!(None, cfg.markers.limit(EntityKind::Vessel));
        assert!(cfg.site.is_none());
    }

    #[test]
    fn test_config_full() {
        let data = r##"
version = 1

feed {
  staleness     = "45s"
  heartbeat     = "2s"
  poll_interval = "1m"
}

render {
  batch_size  = 25
  batch_delay = "250ms"
}

markers {
  vessels = 50
}

site {
  name       = "fleet"
  base_url   = "https://api.example.net/v1"
  stream_url = "wss://api.example.net/v1/positions"
  auth {
    api_key = "foobar"
  }
}
"##;
        let cfg = EngineConfig::from_hcl(data).unwrap();
        assert_eq!(Duration::from_secs(45), cfg.feed.staleness);
        assert_eq!(Duration::from_secs(60), cfg.feed.poll_interval);
        assert_eq!(Duration::from_secs(60), cfg.feed.reconnect_max);
        assert_eq!(25, cfg.render.batch_size);
        assert_eq!(Duration::from_millis(250), cfg.render.batch_delay);
        assert_eq!(200, cfg.render.max_per_run);
        assert_eq!(Some(50), cfg.markers.limit(EntityKind::Vessel));
        assert_eq!(None, cfg.markers.refineries);

        let site = cfg.site.unwrap();
        assert_eq!("fleet", site.name);
        assert_eq!(
            Auth::Key {
                api_key: "foobar".to_string()
            },
            site.auth
        );
    }

    #[test]
    fn test_config_bad_version() {
        assert!(EngineConfig::from_hcl("version = 2").is_err());

        let cfg = EngineConfig {
            version: 0,
            ..Default::default()
        };
        assert_eq!(Err(EngineError::BadConfigVersion(0, 1)), cfg.validate());
    }

    #[test]
    fn test_config_bad_duration() {
        let data = r##"
version = 1
feed {
  heartbeat = "soon"
}
"##;
        assert!(EngineConfig::from_hcl(data).is_err());
    }

    #[rstest]
    #[case("render {\n batch_size = 0\n}")]
    #[case("render {\n max_per_run = 0\n}")]
    #[case("feed {\n poll_interval = \"0s\"\n}")]
    #[case("feed {\n heartbeat = \"0s\"\n}")]
    #[case("feed {\n reconnect_min = \"2m\"\n reconnect_max = \"1m\"\n}")]
    fn test_config_invalid(#[case] block: &str) {
        let data = format!("version = 1\n{block}\n");
        let cfg: EngineConfig = hcl::from_str(&data).unwrap();
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }
}
