#![cfg(test)]

//! In-memory fakes for every port, shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{SinkError, SourceError, StoreError};
use crate::ports::{EventSink, SourceApi, WatermarkStore};
use crate::types::{
    CommitCursor, CommitEntry, CommitPage, EventRecord, RepositoryRecord, Watermark, EVENT_SYSTEM,
};
use crate::RepositoryName;

/// A distinct, valid event numbered `i`.
pub(crate) fn event(i: usize) -> EventRecord {
    EventRecord {
        system: EVENT_SYSTEM.to_string(),
        timestamp: format!("2021-01-01 00:00:{:02}", i % 60),
        is_utc: true,
        tzinfo: String::new(),
        username: format!("dev{i}@allowed.com"),
        data: "svc-a".to_string(),
    }
}

pub(crate) fn repository(name: &str, pushed_at: &str) -> RepositoryRecord {
    RepositoryRecord {
        name: Some(name.to_string()),
        pushed_at: Some(pushed_at.to_string()),
        commits_url: Some(commits_url(name)),
    }
}

pub(crate) fn commits_url(name: &str) -> String {
    format!("https://api.example.test/repos/org/{name}/commits{{/sha}}")
}

pub(crate) fn repo_name(name: &str) -> RepositoryName {
    RepositoryName::new(name).unwrap()
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

pub(crate) struct RecordingSink {
    batches: Mutex<Vec<Vec<EventRecord>>>,
    scripted: Mutex<VecDeque<String>>,
    fallback: String,
    reachable: bool,
}

impl RecordingSink {
    pub(crate) fn accepting() -> Self {
        Self::responding("OK")
    }

    pub(crate) fn responding(body: &str) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            fallback: body.to_string(),
            reachable: true,
        }
    }

    /// Answers with `bodies` in order, then `"OK"` forever.
    pub(crate) fn scripted<'a>(bodies: impl IntoIterator<Item = &'a str>) -> Self {
        let sink = Self::accepting();
        *sink.scripted.lock().unwrap() = bodies.into_iter().map(str::to_string).collect();
        sink
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::accepting()
        }
    }

    pub(crate) fn batches(&self) -> Vec<Vec<EventRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub(crate) fn delivered_events(&self) -> Vec<EventRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&self, batch: &[EventRecord]) -> Result<String, SinkError> {
        if !self.reachable {
            return Err(SinkError::Transport {
                message: "connection refused".to_string(),
            });
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        let next = self.scripted.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

// ---------------------------------------------------------------------------
// Watermark store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MemoryWatermarkStore {
    values: Mutex<HashMap<String, Watermark>>,
    writes: Mutex<Vec<(String, Watermark)>>,
}

impl MemoryWatermarkStore {
    pub(crate) fn with(self, name: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(Watermark::storage_key(&repo_name(name)), Watermark::new(value));
        self
    }

    pub(crate) fn value(&self, name: &str) -> Option<Watermark> {
        self.values
            .lock()
            .unwrap()
            .get(&Watermark::storage_key(&repo_name(name)))
            .cloned()
    }

    pub(crate) fn writes(&self) -> Vec<(String, Watermark)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn get(&self, repository: &RepositoryName) -> Result<Watermark, StoreError> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&Watermark::storage_key(repository))
            .cloned()
            .unwrap_or_default())
    }

    async fn set(&self, repository: &RepositoryName, value: &Watermark) -> Result<(), StoreError> {
        let key = Watermark::storage_key(repository);
        self.writes
            .lock()
            .unwrap()
            .push((repository.to_string(), value.clone()));
        self.values.lock().unwrap().insert(key, value.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Serves a fixed repository list and commit pages keyed by the cursor URL.
///
/// First pages are keyed by the repository's `commits_url` template, later
/// pages by their `next` URL. Unknown cursors yield an empty page.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    repositories: Vec<RepositoryRecord>,
    pages: HashMap<String, CommitPage>,
    failing: Option<String>,
    requests: Mutex<Vec<CommitCursor>>,
}

impl ScriptedSource {
    pub(crate) fn new(repositories: Vec<RepositoryRecord>) -> Self {
        Self {
            repositories,
            ..Self::default()
        }
    }

    pub(crate) fn page(
        mut self,
        key: impl Into<String>,
        commits: Vec<CommitEntry>,
        next: Option<&str>,
    ) -> Self {
        self.pages.insert(
            key.into(),
            CommitPage {
                commits,
                next: next.map(str::to_string),
            },
        );
        self
    }

    /// Makes fetching the page stored under `key` fail with a transport error.
    pub(crate) fn failing_at(mut self, key: impl Into<String>) -> Self {
        self.failing = Some(key.into());
        self
    }

    pub(crate) fn requests(&self) -> Vec<CommitCursor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceApi for ScriptedSource {
    async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>, SourceError> {
        Ok(self.repositories.clone())
    }

    async fn fetch_commit_page(&self, cursor: &CommitCursor) -> Result<CommitPage, SourceError> {
        self.requests.lock().unwrap().push(cursor.clone());
        let key = match cursor {
            CommitCursor::First { commits_url, .. } => commits_url,
            CommitCursor::Next(url) => url,
        };
        if self.failing.as_deref() == Some(key.as_str()) {
            return Err(SourceError::Transport {
                url: key.clone(),
                message: "connection reset".to_string(),
            });
        }
        Ok(self.pages.get(key).cloned().unwrap_or_default())
    }
}
