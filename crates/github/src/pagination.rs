//! Cursor-following pagination over GitHub listing endpoints.
//!
//! GitHub advertises the next page of a listing in the `Link` response header.
//! [`PageCursor`] walks those links lazily, one request per
//! [`next_page`](PageCursor::next_page) call, and stops at the first page that
//! has no `next` link or whose body is an empty or non-array JSON value. A
//! cursor cannot be restarted; build a new one from the initial URL instead.

use std::marker::PhantomData;
use std::sync::Arc;

use engine::SourceError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::link::parse_next_link;
use crate::transport::{HttpResponse, HttpTransport};

/// Status GitHub returns for the commit listing of a repository with no commits.
const EMPTY_REPOSITORY_STATUS: u16 = 409;

/// One decoded page and the URL of the page after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Issues GETs through an [`HttpTransport`] and decodes listing pages.
#[derive(Clone)]
pub struct PaginatedFetcher {
    transport: Arc<dyn HttpTransport>,
}

impl PaginatedFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Starts a lazy walk over the listing beginning at `initial_url`.
    pub fn pages<T>(&self, initial_url: impl Into<String>) -> PageCursor<'_, T> {
        PageCursor {
            fetcher: self,
            next: Some(initial_url.into()),
            first: true,
            _items: PhantomData,
        }
    }

    /// Fetches every page of a listing and concatenates the items in page order.
    ///
    /// # Errors
    ///
    /// Fails on any transport error, on a body that is not JSON, or when the
    /// *first* page is not a JSON array.
    pub async fn fetch_all<T>(&self, initial_url: &str) -> Result<Vec<T>, SourceError>
    where
        T: DeserializeOwned + Default,
    {
        let mut cursor = self.pages(initial_url);
        let mut items = Vec::new();
        while let Some(page) = cursor.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }

    /// Fetches exactly one page.
    ///
    /// GitHub answers an empty repository's commit listing with `409 Conflict`
    /// and an error object; that yields an empty page.
    ///
    /// # Errors
    ///
    /// Any other body that is not a JSON array (bad credentials, rate limits,
    /// server errors) is [`SourceError::UnexpectedShape`].
    pub async fn fetch_page<T>(&self, url: &str) -> Result<Page<T>, SourceError>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.transport.get(url).await?;
        let next = response.link.as_deref().and_then(parse_next_link);
        let items = match decode(url, &response)? {
            Some(items) => items,
            None if response.status == EMPTY_REPOSITORY_STATUS => {
                warn!(url, status = response.status, "repository is empty; treating page as empty");
                Vec::new()
            }
            None => {
                return Err(SourceError::UnexpectedShape {
                    url: url.to_string(),
                    status: response.status,
                })
            }
        };
        Ok(Page { items, next })
    }
}

/// A lazy, finite walk over the pages of one listing.
pub struct PageCursor<'a, T> {
    fetcher: &'a PaginatedFetcher,
    next: Option<String>,
    first: bool,
    _items: PhantomData<fn() -> T>,
}

impl<T> PageCursor<'_, T>
where
    T: DeserializeOwned + Default,
{
    /// Fetches the next page, or returns `Ok(None)` once the listing is
    /// exhausted.
    ///
    /// The first page is always returned, even when empty, and must be a JSON
    /// array. Later pages that are empty or not arrays end the walk.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, SourceError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        let response = self.fetcher.transport.get(&url).await?;
        let decoded = decode(&url, &response)?;
        let first = std::mem::replace(&mut self.first, false);

        match decoded {
            Some(items) if first || !items.is_empty() => {
                self.next = response.link.as_deref().and_then(parse_next_link);
                debug!(url = %url, items = items.len(), more = self.next.is_some(), "page fetched");
                Ok(Some(items))
            }
            Some(_) => Ok(None),
            None if first => Err(SourceError::UnexpectedShape {
                url,
                status: response.status,
            }),
            None => Ok(None),
        }
    }
}

/// Decodes a listing body. Returns `Ok(None)` when the body is valid JSON but
/// not an array.
///
/// Array elements that do not match `T` decode to `T::default()` so that a
/// single odd entry never aborts a listing; callers drop incomplete records.
fn decode<T>(url: &str, response: &HttpResponse) -> Result<Option<Vec<T>>, SourceError>
where
    T: DeserializeOwned + Default,
{
    let value: Value = serde_json::from_str(&response.body).map_err(|e| SourceError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let Value::Array(entries) = value else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .into_iter()
            .map(|entry| serde_json::from_value(entry).unwrap_or_default())
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Item {
        #[serde(default)]
        id: u32,
    }

    const P1: &str = "https://api.example.test/list?page=1";
    const P2: &str = "https://api.example.test/list?page=2";
    const P3: &str = "https://api.example.test/list?page=3";

    fn fetcher(transport: MockTransport) -> (PaginatedFetcher, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        (PaginatedFetcher::new(transport.clone()), transport)
    }

    fn ids(items: &[Item]) -> Vec<u32> {
        items.iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn test_fetch_all_concatenates_pages_in_order() {
        let (fetcher, transport) = fetcher(
            MockTransport::default()
                .route(P1, r#"[{"id":1},{"id":2}]"#, Some(P2))
                .route(P2, r#"[{"id":3}]"#, Some(P3))
                .route(P3, r#"[{"id":4},{"id":5}]"#, None),
        );

        let items: Vec<Item> = fetcher.fetch_all(P1).await.unwrap();

        assert_eq!(ids(&items), vec![1, 2, 3, 4, 5]);
        assert_eq!(transport.requests(), vec![P1, P2, P3]);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_at_empty_page() {
        let (fetcher, transport) = fetcher(
            MockTransport::default()
                .route(P1, r#"[{"id":1}]"#, Some(P2))
                .route(P2, "[]", Some(P3)),
        );

        let items: Vec<Item> = fetcher.fetch_all(P1).await.unwrap();

        assert_eq!(ids(&items), vec![1]);
        assert_eq!(transport.requests(), vec![P1, P2]);
    }

    #[tokio::test]
    async fn test_fetch_all_stops_at_non_array_page() {
        let (fetcher, transport) = fetcher(
            MockTransport::default()
                .route(P1, r#"[{"id":1}]"#, Some(P2))
                .route(P2, r#"{"message":"API rate limit exceeded"}"#, Some(P3)),
        );

        let items: Vec<Item> = fetcher.fetch_all(P1).await.unwrap();

        assert_eq!(ids(&items), vec![1]);
        assert_eq!(transport.requests(), vec![P1, P2]);
    }

    #[tokio::test]
    async fn test_empty_first_page_still_follows_link() {
        let (fetcher, _) = fetcher(
            MockTransport::default()
                .route(P1, "[]", Some(P2))
                .route(P2, r#"[{"id":7}]"#, None),
        );

        let items: Vec<Item> = fetcher.fetch_all(P1).await.unwrap();

        assert_eq!(ids(&items), vec![7]);
    }

    #[tokio::test]
    async fn test_non_array_first_page_is_an_error() {
        let (fetcher, _) = fetcher(MockTransport::default().route_status(
            P1,
            401,
            r#"{"message":"Bad credentials"}"#,
        ));

        let err = fetcher.fetch_all::<Item>(P1).await.unwrap_err();

        assert!(matches!(
            err,
            SourceError::UnexpectedShape { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let (fetcher, _) = fetcher(
            MockTransport::default()
                .route(P1, r#"[{"id":1}]"#, Some(P2))
                .route(P2, "<html>502 Bad Gateway</html>", None),
        );

        let err = fetcher.fetch_all::<Item>(P1).await.unwrap_err();

        assert!(matches!(err, SourceError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let (fetcher, _) = fetcher(MockTransport::default().route(P1, "[]", Some(P2)));

        let err = fetcher.fetch_all::<Item>(P1).await.unwrap_err();

        assert!(matches!(err, SourceError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_cursor_is_exhausted_after_last_page() {
        let (fetcher, transport) =
            fetcher(MockTransport::default().route(P1, r#"[{"id":1}]"#, None));

        let mut cursor = fetcher.pages::<Item>(P1);
        assert_eq!(cursor.next_page().await.unwrap().map(|p| p.len()), Some(1));
        assert!(cursor.next_page().await.unwrap().is_none());
        assert!(cursor.next_page().await.unwrap().is_none());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_odd_entries_decode_to_default() {
        let (fetcher, _) = fetcher(
            MockTransport::default().route(P1, r#"[{"id":1}, null, "x", {"id":"nope"}]"#, None),
        );

        let items: Vec<Item> = fetcher.fetch_all(P1).await.unwrap();

        assert_eq!(ids(&items), vec![1, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_fetch_page_returns_next_cursor() {
        let (fetcher, _) =
            fetcher(MockTransport::default().route(P1, r#"[{"id":1}]"#, Some(P2)));

        let page: Page<Item> = fetcher.fetch_page(P1).await.unwrap();

        assert_eq!(ids(&page.items), vec![1]);
        assert_eq!(page.next.as_deref(), Some(P2));
    }

    #[tokio::test]
    async fn test_fetch_page_treats_empty_repository_as_empty() {
        let (fetcher, _) = fetcher(MockTransport::default().route_status(
            P1,
            409,
            r#"{"message":"Git Repository is empty."}"#,
        ));

        let page: Page<Item> = fetcher.fetch_page(P1).await.unwrap();

        assert!(page.items.is_empty());
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_fetch_page_error_object_is_an_error() {
        for (status, body) in [
            (401, r#"{"message":"Bad credentials"}"#),
            (403, r#"{"message":"API rate limit exceeded"}"#),
            (500, r#"{"message":"Server Error"}"#),
            (200, r#"{"unexpected":true}"#),
        ] {
            let (fetcher, _) = fetcher(MockTransport::default().route_status(P1, status, body));

            let err = fetcher.fetch_page::<Item>(P1).await.unwrap_err();

            assert!(
                matches!(
                    &err,
                    SourceError::UnexpectedShape { url, status: s } if url == P1 && *s == status
                ),
                "status {status}: {err:?}"
            );
        }
    }
}
