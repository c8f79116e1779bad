//! Durations in configuration files are written the human way (`"30s"`, `"500ms"`).
//!
use std::time::Duration;

use serde::de::Error;
use serde::{Deserialize, Deserializer};

/// For use with `#[serde(deserialize_with = "...")]`.
///
pub fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(|e| D::Error::custom(format!("bad duration '{s}': {e}")))
}
