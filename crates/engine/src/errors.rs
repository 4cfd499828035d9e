//! Error types for the synchronisation domain.
//!
//! Each port trait in [`crate::ports`] has its own error type so adapters can
//! report failures without knowing about the orchestrator. [`SyncError`]
//! aggregates them; every variant of it aborts the current run.
//!
//! Sink *rejections* (a response body other than `"OK"`) are deliberately not an
//! error: they surface as [`crate::DispatchOutcome::Rejected`] and the run
//! continues.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures while reading from the source-control hosting API.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request could not be sent or the response body could not be read.
    #[error("Request to {url} failed: {message}")]
    Transport {
        /// URL of the failed request.
        url: String,
        /// Description of the underlying transport failure.
        message: String,
    },

    /// The response body was not valid JSON.
    #[error("Response from {url} is not valid JSON: {message}")]
    Decode {
        /// URL of the request whose body failed to decode.
        url: String,
        /// Decoder error message.
        message: String,
    },

    /// A URL taken from configuration or from a listing could not be parsed.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser error message.
        message: String,
    },

    /// The response was JSON but not the array the listing endpoint promises.
    #[error("Response from {url} (HTTP {status}) is not a JSON array")]
    UnexpectedShape {
        /// URL of the offending request.
        url: String,
        /// HTTP status code of the response.
        status: u16,
    },
}

/// Failures of the durable watermark store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Watermark store at {target} is unreachable: {message}")]
    Connect {
        /// Connection target, without credentials.
        target: String,
        /// Backend error message.
        message: String,
    },

    /// The backend rejected or failed the operation.
    #[error("Watermark store {operation} failed for key '{key}': {message}")]
    Backend {
        /// Operation that failed (`"get"` or `"set"`).
        operation: &'static str,
        /// Fully-qualified storage key.
        key: String,
        /// Backend error message.
        message: String,
    },
}

/// Failures reaching the downstream event sink.
///
/// Only transport-level failures are errors; a reachable sink that answers with
/// anything other than `"OK"` is a rejection, not a [`SinkError`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The batch could not be sent or the response could not be read.
    #[error("Delivery to sink failed: {message}")]
    Transport {
        /// Description of the underlying transport failure.
        message: String,
    },

    /// The batch could not be serialised.
    #[error("Batch could not be serialised: {message}")]
    Encode {
        /// Serialiser error message.
        message: String,
    },
}

/// A commit date that could not be interpreted as a timestamp.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unparseable timestamp: '{value}'")]
pub struct TimestampError {
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a synchronisation run.
///
/// Watermarks persisted for repositories completed before the failure are kept;
/// nothing is rolled back.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing repositories or commits failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Reading or writing a watermark failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The sink could not be reached.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// An admitted commit carried a date the normaliser could not parse.
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}
