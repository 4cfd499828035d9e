//! commit-sync GitHub infrastructure adapter.
//!
//! Implements the [`engine::SourceApi`] trait over the GitHub REST API using
//! `reqwest` with HTTP Basic authentication.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! All GitHub API details (authentication, `Link`-header pagination, URL
//! templates) are handled here; the [`engine`] crate never sees them.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`link`] | `Link` header parsing |
//! | [`transport`] | [`HttpTransport`] boundary and the reqwest implementation |
//! | [`pagination`] | [`PaginatedFetcher`] and the lazy [`PageCursor`] |
//! | [`source`] | [`GithubSource`], the [`engine::SourceApi`] implementation |

pub mod error;
pub mod link;
pub mod pagination;
pub mod source;
pub mod transport;

pub use error::GithubError;
pub use link::parse_next_link;
pub use pagination::{Page, PageCursor, PaginatedFetcher};
pub use source::{
    first_commits_url, repositories_url, GithubConfig, GithubSource, DEFAULT_API_BASE,
};
pub use transport::{Credentials, HttpResponse, HttpTransport, ReqwestTransport};
