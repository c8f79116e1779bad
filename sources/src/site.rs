//! Module that defines what is a site (REST endpoint, push feed, etc.)
//!
//! This is used to configure where entities and positions come from through the `site` block
//! of the configuration file.
//!
//! Sites can have different ways to authenticate the request, either an API key passed as a
//! header or plain login/password.
//!
//! Each entity kind has its own route, `/<kind>s` unless told otherwise.
//!
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use seawatch_common::EntityKind;

use crate::SourceError;

/// Describe what a site is and associated credentials.
///
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Site {
    /// Name of the site
    pub name: String,
    /// Base URL for bulk reads
    pub base_url: String,
    /// URL of the push feed, if any
    #[serde(default)]
    pub stream_url: Option<String>,
    /// Credentials
    #[serde(default)]
    pub auth: Auth,
    /// Per-kind routes, keyed by kind name
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

/// Describe the possible ways to authenticate oneself
///
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Auth {
    /// Nothing special, no auth
    #[default]
    Anon,
    /// Using an API key supplied through a header
    Key { api_key: String },
    /// Using plain login/password
    Login { username: String, password: String },
}

impl Display for Auth {
    /// Obfuscate the passwords & keys
    ///
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let auth = match self.clone() {
            Auth::Key { .. } => Auth::Key {
                api_key: "HIDDEN".to_string(),
            },
            Auth::Login { username, .. } => Auth::Login {
                username,
                password: "HIDDEN".to_string(),
            },
            Auth::Anon => Auth::Anon,
        };
        write!(f, "{:?}", auth)
    }
}

impl Site {
    pub fn new(name: &str, base_url: &str) -> Self {
        Site {
            name: name.to_string(),
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Full URL for a given kind.
    ///
    pub fn endpoint(&self, kind: EntityKind) -> String {
        let route = match self.routes.get(&kind.to_string()) {
            Some(route) => route.clone(),
            None => format!("/{kind}s"),
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }

    /// URL of the push channel.
    ///
    pub fn stream_endpoint(&self) -> Result<&str, SourceError> {
        self.stream_url
            .as_deref()
            .ok_or_else(|| SourceError::UnknownRoute("stream".to_string(), self.name.clone()))
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} base={} stream={} auth={}",
            self.name,
            self.base_url,
            self.stream_url.as_deref().unwrap_or("none"),
            self.auth
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn site() -> Site {
        let mut site = Site::new("fleet", "https://api.example.net/v1/");
        site.routes
            .insert("refinery".to_string(), "/assets/refineries".to_string());
        site
    }

    #[rstest]
    #[case(EntityKind::Vessel, "https://api.example.net/v1/vessels")]
    #[case(EntityKind::Port, "https://api.example.net/v1/ports")]
    #[case(EntityKind::Refinery, "https://api.example.net/v1/assets/refineries")]
    fn test_site_endpoint(#[case] kind: EntityKind, #[case] url: &str) {
        assert_eq!(url, site().endpoint(kind));
    }

    #[test]
    fn test_site_no_stream() {
        assert_eq!(
            Err(SourceError::UnknownRoute("stream".to_string(), "fleet".to_string())),
            site().stream_endpoint()
        );
    }

    #[test]
    fn test_auth_display_hides_secrets() {
        let auth = Auth::Login {
            username: "ops".to_string(),
            password: "hunter2".to_string(),
        };
        let s = auth.to_string();
        assert!(s.contains("ops"));
        assert!(!s.contains("hunter2"));

        let auth = Auth::Key {
            api_key: "sk-123".to_string(),
        };
        assert!(!auth.to_string().contains("sk-123"));
    }

    #[test]
    fn test_auth_decode_untagged() {
        let auth: Auth = serde_json::from_str(r#"{"api_key":"abc"}"#).unwrap();
        assert_eq!(
            Auth::Key {
                api_key: "abc".to_string()
            },
            auth
        );
    }
}
