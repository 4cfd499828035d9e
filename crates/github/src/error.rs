//! GitHub adapter construction errors.
//!
//! Errors raised while *talking* to GitHub are [`engine::SourceError`]s; this
//! type only covers setting the adapter up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP client could not be built: {0}")]
    ClientBuild(String),

    #[error("Invalid API base URL '{url}': {message}")]
    InvalidApiBase { url: String, message: String },
}
