//! Shared value types for the synchronisation domain.
//!
//! Records decoded from the source API are deliberately lenient: every field is
//! optional at the decode layer and the orchestrator decides what to do with
//! incomplete records. Types produced by this system ([`Watermark`],
//! [`EventRecord`]) carry their invariants in their constructors.

use serde::{Deserialize, Serialize};

use crate::errors::TimestampError;
use crate::timestamp::normalize;
use crate::RepositoryName;

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// The latest commit-author timestamp a repository has been processed through.
///
/// Ordering is plain string ordering. This is only meaningful because every
/// value the API produces shares the same fixed-width ISO 8601 layout; the
/// comparison is kept textual so stored values written by earlier deployments
/// compare exactly as they always have.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark(String);

impl Watermark {
    /// Value assumed for a repository that has never been synchronised.
    pub const EPOCH: &'static str = "1970-01-01T00:00:00";

    /// Creates a watermark from a stored or observed timestamp string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The epoch-start sentinel.
    pub fn epoch() -> Self {
        Self(Self::EPOCH.to_string())
    }

    /// Returns the watermark as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `timestamp` sorts strictly after this watermark.
    pub fn is_before(&self, timestamp: &str) -> bool {
        timestamp > self.0.as_str()
    }

    /// Storage key for a repository's watermark: `"<repo-name>-pushed_at"`.
    ///
    /// Stores may add their own namespace prefix in front of this key.
    pub fn storage_key(repository: &RepositoryName) -> String {
        format!("{repository}-pushed_at")
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::epoch()
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Source records
// ---------------------------------------------------------------------------

/// One entry of the organization repository listing.
///
/// Unknown fields are ignored. A record missing any of the three fields is
/// skipped by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Short repository name.
    #[serde(default)]
    pub name: Option<String>,
    /// Timestamp of the most recent push to any branch.
    #[serde(default)]
    pub pushed_at: Option<String>,
    /// Commit listing URL template, e.g. `".../repos/o/r/commits{/sha}"`.
    #[serde(default)]
    pub commits_url: Option<String>,
}

/// One entry of a commit listing page, as returned by the API.
///
/// Only the nested `commit.author` object is of interest. Entries that are not
/// JSON objects decode to the default (empty) value and are dropped later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    #[serde(default)]
    pub commit: Option<CommitDetail>,
}

/// The `commit` object nested in a [`CommitEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Option<RawAuthor>,
}

/// The `commit.author` object as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// A commit author with both fields the orchestrator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitAuthor<'a> {
    pub email: &'a str,
    pub date: &'a str,
}

impl CommitEntry {
    /// Builds an entry from an author email and date. Mostly useful in tests.
    pub fn authored(email: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            commit: Some(CommitDetail {
                author: Some(RawAuthor {
                    email: Some(email.into()),
                    date: Some(date.into()),
                }),
            }),
        }
    }

    /// Returns the author, or `None` if any part of `commit.author.{email,date}`
    /// is missing.
    pub fn author(&self) -> Option<CommitAuthor<'_>> {
        let author = self.commit.as_ref()?.author.as_ref()?;
        Some(CommitAuthor {
            email: author.email.as_deref()?,
            date: author.date.as_deref()?,
        })
    }
}

/// One page of a commit listing together with the cursor to the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPage {
    /// Entries in API order.
    pub commits: Vec<CommitEntry>,
    /// URL of the next page, if the response advertised one.
    pub next: Option<String>,
}

/// Position in a repository's commit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitCursor {
    /// The first page, built from the repository's URL template and filtered to
    /// commits since the stored watermark.
    First {
        /// The repository's `commits_url` template.
        commits_url: String,
        /// Lower bound passed as the `since` query parameter.
        since: Watermark,
    },
    /// A page URL taken verbatim from the previous page's `link` header.
    Next(String),
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Value of the `system` field on every event this crate emits.
pub const EVENT_SYSTEM: &str = "github-commits";

/// A normalised commit event as delivered to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Always [`EVENT_SYSTEM`].
    pub system: String,
    /// Commit time in UTC, `YYYY-MM-DD HH:MM:SS[.ffffff]`.
    pub timestamp: String,
    /// Always `true`; `timestamp` is UTC.
    pub is_utc: bool,
    /// The author's original offset (`"+HH:MM"`), or empty.
    pub tzinfo: String,
    /// Author email address.
    pub username: String,
    /// Repository name.
    pub data: String,
}

impl EventRecord {
    /// Normalises a commit author's date and builds the event for it.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] if the date cannot be parsed.
    pub fn from_commit(
        repository: &RepositoryName,
        author: CommitAuthor<'_>,
    ) -> Result<Self, TimestampError> {
        let normalized = normalize(author.date)?;
        Ok(Self {
            system: EVENT_SYSTEM.to_string(),
            timestamp: normalized.utc_string(),
            is_utc: true,
            tzinfo: normalized.offset().to_string(),
            username: author.email.to_string(),
            data: repository.as_str().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Run configuration and results
// ---------------------------------------------------------------------------

/// Number of buffered events above which the dispatcher flushes on its own.
pub const DEFAULT_BATCH_THRESHOLD: usize = 100;

/// Domain settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Only authors whose email ends with this suffix produce events.
    pub allowed_email_domain: String,
}

impl SyncSettings {
    pub fn new(allowed_email_domain: impl Into<String>) -> Self {
        Self {
            allowed_email_domain: allowed_email_domain.into(),
        }
    }
}

/// Counters describing what a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub repositories_listed: usize,
    pub repositories_incomplete: usize,
    pub repositories_up_to_date: usize,
    pub repositories_synced: usize,
    pub commit_pages: usize,
    pub commits_scanned: usize,
    pub events_enqueued: usize,
    pub batches_delivered: usize,
    pub batches_rejected: usize,
    /// Events still buffered when the run ended; lost if the process exits.
    pub events_pending: usize,
}
