//! REST access method.
//!
//! `GET <base_url><route>?<filter>` returning a JSON array of entities.  This is what the polling
//! fallback and the directory reads use.
//!
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use tracing::{debug, trace, warn};

use seawatch_common::{EntityKind, TrackedEntity};

use crate::{Auth, Fetchable, Filter, Site, SourceError};

/// Default timeout for one request
const DEF_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct RestSource {
    /// Where and how
    site: Site,
    /// reqwest async client, cheap to clone
    client: Client,
}

impl RestSource {
    pub fn new(site: &Site) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(crate::version())
            .timeout(DEF_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;
        Ok(RestSource {
            site: site.clone(),
            client,
        })
    }

    /// Build the actual request, credentials included.
    ///
    fn request(&self, kind: EntityKind, filter: &Filter) -> Result<Request, SourceError> {
        let url = self.site.endpoint(kind);
        trace!("GET {url} filter={filter}");

        let req = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .query(&filter.to_query());
        let req = match &self.site.auth {
            Auth::Anon => req,
            Auth::Key { api_key } => req.header("x-api-key", api_key),
            Auth::Login { username, password } => req.basic_auth(username, Some(password)),
        };
        req.build().map_err(|e| SourceError::Http(e.to_string()))
    }
}

/// Decode a response body, keeping only entities of the kind we asked for.
///
fn decode_entities(kind: EntityKind, body: &str) -> Result<Vec<TrackedEntity>, SourceError> {
    let list: Vec<TrackedEntity> =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;

    let total = list.len();
    let list: Vec<TrackedEntity> = list.into_iter().filter(|e| e.kind() == kind).collect();
    if list.len() != total {
        warn!("dropped {} entities not of kind {kind}", total - list.len());
    }
    Ok(list)
}

#[async_trait]
impl Fetchable for RestSource {
    fn name(&self) -> String {
        self.site.name.clone()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_entities(
        &self,
        kind: EntityKind,
        filter: &Filter,
    ) -> Result<Vec<TrackedEntity>, SourceError> {
        let req = self.request(kind, filter)?;
        let url = req.url().to_string();

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => trace!("OK"),
            code => return Err(SourceError::Status(code.as_u16(), url)),
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;
        debug!("got {} bytes from {url}", body.len());

        decode_entities(kind, &body)
    }
}
