//! Document fetches over the HTTP transport
//!
//! Full anime metadata and the user's list and vote snapshots are served as
//! tag-delimited documents. Bodies are handed to the caller unparsed.

use crate::config::CoreConfig;
use crate::protocol::ban::{Axis, BanTracker};
use crate::protocol::error::{ProtocolError, Result};
use crate::protocol::messages::Lookup;
use crate::protocol::rate_limiter::RateLimiter;
use crate::protocol::transport::HttpTransport;
use crate::security::SecureString;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of document requested from the HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Anime,
    MyList,
    Votes,
}

impl DocumentKind {
    fn request_name(self) -> &'static str {
        match self {
            DocumentKind::Anime => "anime",
            DocumentKind::MyList => "mylist",
            DocumentKind::Votes => "votes",
        }
    }

    fn needs_credentials(self) -> bool {
        !matches!(self, DocumentKind::Anime)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.request_name())
    }
}

/// A fetched document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDocument {
    pub kind: DocumentKind,
    pub body: String,
}

/// Rate-limited, ban-aware HTTP document client
pub struct HttpClient {
    transport: Arc<dyn HttpTransport>,
    limiter: RateLimiter,
    bans: Arc<BanTracker>,
    base_url: String,
    client_name: String,
    client_version: u32,
    username: Option<String>,
    password: Option<SecureString>,
}

impl HttpClient {
    pub fn new(config: &CoreConfig, transport: Arc<dyn HttpTransport>, bans: Arc<BanTracker>) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new("HTTP", config.http_rate.clone()),
            bans,
            base_url: config.registry.http_base_url.clone(),
            client_name: config.registry.client_name.clone(),
            client_version: config.registry.client_version,
            username: config.registry.username.clone(),
            password: config.registry.password.clone(),
        }
    }

    pub async fn anime(&self, aid: u64) -> Result<Lookup<HttpDocument>> {
        self.fetch(DocumentKind::Anime, &[("aid", aid.to_string())])
            .await
    }

    pub async fn mylist(&self) -> Result<Lookup<HttpDocument>> {
        self.fetch(DocumentKind::MyList, &[]).await
    }

    pub async fn votes(&self) -> Result<Lookup<HttpDocument>> {
        self.fetch(DocumentKind::Votes, &[]).await
    }

    async fn fetch(
        &self,
        kind: DocumentKind,
        extra: &[(&'static str, String)],
    ) -> Result<Lookup<HttpDocument>> {
        self.bans.check(Axis::Http)?;
        let url = self.build_url(kind, extra)?;

        self.limiter.ensure_rate().await;
        // Checked again: a ban may have landed while waiting for our turn
        self.bans.check(Axis::Http)?;

        debug!("HTTP --> {kind} {extra:?}");
        let body = self.transport.get_text(&url).await?;
        debug!("HTTP <-- {kind}: {} bytes", body.len());

        self.classify(kind, body)
    }

    fn classify(&self, kind: DocumentKind, body: String) -> Result<Lookup<HttpDocument>> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Ok(Lookup::NoData);
        }

        let lowered = trimmed.to_ascii_lowercase();
        if lowered.contains(">banned<") {
            let reason = format!("{kind} request answered with a ban notice");
            self.bans.set_banned(Axis::Http, reason.clone());
            return Err(ProtocolError::banned(Axis::Http, reason));
        }

        if lowered.starts_with("<error") {
            if lowered.contains("not found") || lowered.contains("no such") {
                return Ok(Lookup::NoData);
            }
            warn!("HTTP {kind} request failed: {trimmed}");
            return Err(ProtocolError::http(format!("registry error: {trimmed}"), false));
        }

        Ok(Lookup::Found(HttpDocument { kind, body }))
    }

    fn build_url(&self, kind: DocumentKind, extra: &[(&'static str, String)]) -> Result<String> {
        let mut params: Vec<(&str, String)> = vec![
            ("request", kind.request_name().to_string()),
            ("client", self.client_name.clone()),
            ("clientver", self.client_version.to_string()),
            ("protover", crate::protocol::HTTP_PROTOCOL_VERSION.to_string()),
        ];

        if kind.needs_credentials() {
            let username = self.username.as_deref().filter(|name| !name.is_empty());
            let password = self.password.as_ref().filter(|password| !password.is_empty());
            match (username, password) {
                (Some(username), Some(password)) => {
                    params.push(("user", username.to_string()));
                    params.push(("pass", password.expose_secret()));
                }
                _ => return Err(ProtocolError::MissingCredentials),
            }
        }

        params.extend(extra.iter().map(|(key, value)| (*key, value.clone())));

        reqwest::Url::parse_with_params(&self.base_url, &params)
            .map(String::from)
            .map_err(|e| ProtocolError::http(format!("invalid HTTP API url: {e}"), false))
    }
}
