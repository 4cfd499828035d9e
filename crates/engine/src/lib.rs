//! Synchronisation domain for commit-sync.
//!
//! This crate contains every domain concept of the commit synchroniser: the
//! records read from the source API, the watermark rules, timestamp
//! normalisation, event batching, and the orchestrator that ties them together.
//! Infrastructure crates implement the port traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `github`, `store` and `sink` crates define
//! *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryName`, `SyncRunId`, ...) |
//! | [`types`] | Records, [`Watermark`], [`EventRecord`], settings and report |
//! | [`timestamp`] | Conversion of commit dates to naive UTC plus offset |
//! | [`ports`] | [`SourceApi`], [`WatermarkStore`], [`EventSink`] |
//! | [`dispatcher`] | [`BatchDispatcher`] |
//! | [`orchestrator`] | [`SyncOrchestrator`] |
//! | [`errors`] | Port errors and the run-level [`SyncError`] |

pub mod dispatcher;
pub mod errors;
pub mod identifiers;
pub mod orchestrator;
pub mod ports;
pub mod timestamp;
pub mod types;

mod test_support;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use dispatcher::{BatchDispatcher, DispatchOutcome, SINK_ACK};
pub use errors::{SinkError, SourceError, StoreError, SyncError, TimestampError};
pub use identifiers::{OrganizationName, RepositoryName, SyncRunId};
pub use orchestrator::SyncOrchestrator;
pub use ports::{EventSink, SourceApi, WatermarkStore};
pub use timestamp::{normalize, NormalizedTimestamp};
pub use types::{
    CommitAuthor, CommitCursor, CommitDetail, CommitEntry, CommitPage, EventRecord, RawAuthor,
    RepositoryRecord, SyncReport, SyncSettings, Watermark, DEFAULT_BATCH_THRESHOLD, EVENT_SYSTEM,
};
