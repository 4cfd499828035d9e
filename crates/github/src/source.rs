//! [`SourceApi`] implementation over the GitHub REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use engine::{
    CommitCursor, CommitEntry, CommitPage, OrganizationName, RepositoryRecord, SourceApi,
    SourceError, Watermark,
};
use reqwest::Url;

use crate::error::GithubError;
use crate::pagination::PaginatedFetcher;
use crate::transport::{Credentials, HttpTransport, ReqwestTransport};

/// Default REST API base for github.com.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Page size requested from every listing endpoint (GitHub's maximum).
pub const PER_PAGE: u32 = 100;

/// Template segment GitHub appends to `commits_url`.
const SHA_TEMPLATE: &str = "{/sha}";

/// Settings needed to talk to GitHub.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub organization: OrganizationName,
    pub credentials: Credentials,
    pub timeout: Duration,
}

/// Reads an organization's repositories and their commits from GitHub.
pub struct GithubSource {
    fetcher: PaginatedFetcher,
    repositories_url: String,
}

impl GithubSource {
    /// Builds a source backed by a reqwest client.
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        let transport = ReqwestTransport::new(config.credentials.clone(), config.timeout)?;
        Self::with_transport(Arc::new(transport), &config.api_base, &config.organization)
    }

    /// Builds a source over any transport.
    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        api_base: &str,
        organization: &OrganizationName,
    ) -> Result<Self, GithubError> {
        Ok(Self {
            fetcher: PaginatedFetcher::new(transport),
            repositories_url: repositories_url(api_base, organization)?,
        })
    }
}

#[async_trait]
impl SourceApi for GithubSource {
    #[tracing::instrument(skip(self), fields(url = %self.repositories_url))]
    async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, SourceError> {
        self.fetcher.fetch_all(&self.repositories_url).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_commit_page(&self, cursor: &CommitCursor) -> Result<CommitPage, SourceError> {
        let url = match cursor {
            CommitCursor::First { commits_url, since } => first_commits_url(commits_url, since)?,
            CommitCursor::Next(url) => url.clone(),
        };
        let page = self.fetcher.fetch_page::<CommitEntry>(&url).await?;
        Ok(CommitPage {
            commits: page.items,
            next: page.next,
        })
    }
}

/// `<api_base>/orgs/<org>/repos?per_page=100`.
pub fn repositories_url(
    api_base: &str,
    organization: &OrganizationName,
) -> Result<String, GithubError> {
    let invalid = |message: String| GithubError::InvalidApiBase {
        url: api_base.to_string(),
        message,
    };
    let mut url = Url::parse(api_base.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("cannot be a base URL".to_string()))?
        .pop_if_empty()
        .extend(["orgs", organization.as_str(), "repos"]);
    url.query_pairs_mut()
        .append_pair("per_page", &PER_PAGE.to_string());
    Ok(url.into())
}

/// First page of a repository's commit listing: the `{/sha}` template segment
/// is removed and `per_page` and `since` are added.
pub fn first_commits_url(template: &str, since: &Watermark) -> Result<String, SourceError> {
    let stripped = template.replace(SHA_TEMPLATE, "");
    let mut url = Url::parse(&stripped).map_err(|e| SourceError::InvalidUrl {
        url: template.to_string(),
        message: e.to_string(),
    })?;
    url.query_pairs_mut()
        .append_pair("per_page", &PER_PAGE.to_string())
        .append_pair("since", since.as_str());
    Ok(url.into())
}
