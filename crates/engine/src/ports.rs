//! Port traits implemented by the infrastructure crates.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`SourceApi`] | `github::GithubSource` |
//! | [`WatermarkStore`] | `store::RedisWatermarkStore` |
//! | [`EventSink`] | `sink::HttpEventSink` |
//!
//! All traits are object safe (via `async_trait`) so the composition root can
//! hand the orchestrator `Arc<dyn ...>` values.

use async_trait::async_trait;

use crate::errors::{SinkError, SourceError, StoreError};
use crate::types::{CommitCursor, CommitPage, EventRecord, RepositoryRecord, Watermark};
use crate::RepositoryName;

/// Read access to the source-control hosting API.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Lists every repository of the configured organization, following
    /// pagination to the end.
    async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, SourceError>;

    /// Fetches a single page of a repository's commit listing.
    async fn fetch_commit_page(&self, cursor: &CommitCursor) -> Result<CommitPage, SourceError>;
}

/// Durable per-repository watermark storage.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns the stored watermark, or [`Watermark::epoch`] when none exists.
    async fn get(&self, repository: &RepositoryName) -> Result<Watermark, StoreError>;

    /// Replaces the stored watermark (last write wins).
    async fn set(&self, repository: &RepositoryName, value: &Watermark) -> Result<(), StoreError>;
}

/// The downstream event sink.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Sends one batch and returns the raw response body.
    ///
    /// Interpreting the body is the caller's job; only transport failures are
    /// reported as errors.
    async fn deliver(&self, batch: &[EventRecord]) -> Result<String, SinkError>;
}
