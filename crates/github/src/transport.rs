//! HTTP transport boundary for GitHub requests.
//!
//! [`PaginatedFetcher`](crate::PaginatedFetcher) only ever needs three things
//! from a response: the status, the `Link` header, and the body text. Keeping
//! the boundary that small lets the pagination logic be tested against an
//! in-memory transport.

use std::time::Duration;

use async_trait::async_trait;
use engine::SourceError;
use reqwest::header::{ACCEPT, LINK};

use crate::error::GithubError;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("commit-sync/", env!("CARGO_PKG_VERSION"));

/// The parts of an HTTP response the fetcher looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Link` header value, if present.
    pub link: Option<String>,
    pub body: String,
}

/// Transport boundary for all GitHub HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues an authenticated GET.
    async fn get(&self, url: &str) -> Result<HttpResponse, SourceError>;
}

/// HTTP Basic credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A real HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Credentials,
}

impl ReqwestTransport {
    /// Builds a client with the given per-request timeout.
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, GithubError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GithubError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, url: &str) -> Result<HttpResponse, SourceError> {
        let transport = |e: reqwest::Error| SourceError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let link = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(transport)?;

        tracing::debug!(status, has_next = link.is_some(), "response received");
        Ok(HttpResponse { status, link, body })
    }
}

// ---------- Test-only mock transport ----------
