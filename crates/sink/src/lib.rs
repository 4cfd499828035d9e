//! commit-sync event sink adapter.
//!
//! Implements [`engine::EventSink`] as a single HTTP POST of the batch as a JSON
//! array. The response body is handed back untouched; deciding whether it
//! acknowledges the batch is the dispatcher's job.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport only; no batching or retry logic.

use std::time::Duration;

use async_trait::async_trait;
use engine::{EventRecord, EventSink, SinkError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

/// POSTs event batches to a fixed URL.
#[derive(Clone)]
pub struct HttpEventSink {
    client: reqwest::Client,
    url: Url,
}

impl HttpEventSink {
    /// Builds a sink for `url` with the given per-request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let url = Url::parse(url).map_err(|e| SinkError::Transport {
            message: format!("invalid sink URL '{url}': {e}"),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

/// Serialises a batch exactly as it goes on the wire.
pub fn encode_batch(batch: &[EventRecord]) -> Result<Vec<u8>, SinkError> {
    serde_json::to_vec(batch).map_err(|e| SinkError::Encode {
        message: e.to_string(),
    })
}

#[async_trait]
impl EventSink for HttpEventSink {
    #[tracing::instrument(skip_all, fields(url = %self.url, events = batch.len()))]
    async fn deliver(&self, batch: &[EventRecord]) -> Result<String, SinkError> {
        let body = encode_batch(batch)?;
        let transport = |e: reqwest::Error| SinkError::Transport {
            message: e.to_string(),
        };

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;

        tracing::debug!(status, "sink responded");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{CommitAuthor, RepositoryName};
    use serde_json::{json, Value};

    #[test]
    fn test_encode_batch_is_a_json_array() {
        let repo = RepositoryName::new("svc-a").unwrap();
        let event = EventRecord::from_commit(
            &repo,
            CommitAuthor {
                email: "dev@allowed.com",
                date: "2021-03-01T10:00:00-05:00",
            },
        )
        .unwrap();

        let encoded: Value = serde_json::from_slice(&encode_batch(&[event]).unwrap()).unwrap();

        assert_eq!(
            encoded,
            json!([{
                "system": "github-commits",
                "timestamp": "2021-03-01 15:00:00",
                "is_utc": true,
                "tzinfo": "-05:00",
                "username": "dev@allowed.com",
                "data": "svc-a",
            }])
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(HttpEventSink::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_sink_is_a_transport_error() {
        // Reserve a free port, then release it so nothing is listening there.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let url = format!("http://{addr}/events");
        let sink = HttpEventSink::new(&url, Duration::from_secs(2)).unwrap();

        let err = sink.deliver(&[]).await.unwrap_err();

        assert!(matches!(err, SinkError::Transport { .. }));
    }
}
