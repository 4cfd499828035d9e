//! The synchronisation run.
//!
//! For every repository of the organization, in listing order:
//!
//! 1. skip it if the listing entry is incomplete;
//! 2. skip it if the stored watermark is already at or past `pushed_at`;
//! 3. walk its commit pages from the watermark onwards, raising a working
//!    high-water value for *every* commit seen and emitting events only for
//!    allowed-domain commits strictly newer than the stored watermark;
//! 4. persist the high-water value (or `pushed_at` if nothing newer was seen);
//! 5. flush the dispatcher.
//!
//! The watermark tracks all traffic, not just emitted traffic, so commits from
//! other domains are not rescanned on every run.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::dispatcher::{BatchDispatcher, DispatchOutcome};
use crate::errors::SyncError;
use crate::ports::{SourceApi, WatermarkStore};
use crate::types::{CommitCursor, EventRecord, RepositoryRecord, SyncReport, SyncSettings, Watermark};
use crate::{RepositoryName, SyncRunId};

/// Drives one synchronisation run over injected ports.
///
/// The orchestrator owns its [`BatchDispatcher`]; events it buffers live exactly
/// as long as the orchestrator.
pub struct SyncOrchestrator {
    source: Arc<dyn SourceApi>,
    watermarks: Arc<dyn WatermarkStore>,
    dispatcher: BatchDispatcher,
    settings: SyncSettings,
    run_id: SyncRunId,
}

/// What happened to a single repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepositoryOutcome {
    Incomplete,
    UpToDate,
    Synced,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn SourceApi>,
        watermarks: Arc<dyn WatermarkStore>,
        dispatcher: BatchDispatcher,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            watermarks,
            dispatcher,
            settings,
            run_id: SyncRunId::new_random(),
        }
    }

    /// Identifier attached to this run's span.
    pub fn run_id(&self) -> SyncRunId {
        self.run_id
    }

    /// Events buffered but not yet acknowledged by the sink.
    pub fn pending_events(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Synchronises every repository once.
    ///
    /// # Errors
    ///
    /// Aborts on the first source, store, sink-transport or timestamp error.
    /// Watermarks of repositories completed before the failure stay persisted.
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        let span = info_span!("sync_run", run_id = %self.run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        let repositories = self.source.list_repositories().await?;
        report.repositories_listed = repositories.len();
        info!(repositories = repositories.len(), "repository listing fetched");

        for repository in &repositories {
            let span = info_span!(
                "sync_repository",
                repository = repository.name.as_deref().unwrap_or_default()
            );
            match self
                .sync_repository(repository, &mut report)
                .instrument(span)
                .await?
            {
                RepositoryOutcome::Incomplete => report.repositories_incomplete += 1,
                RepositoryOutcome::UpToDate => report.repositories_up_to_date += 1,
                RepositoryOutcome::Synced => report.repositories_synced += 1,
            }
        }

        report.events_pending = self.dispatcher.pending();
        if report.events_pending > 0 {
            warn!(
                events = report.events_pending,
                "run finished with undelivered events"
            );
        }
        info!(
            synced = report.repositories_synced,
            up_to_date = report.repositories_up_to_date,
            events = report.events_enqueued,
            "sync run complete"
        );
        Ok(report)
    }

    async fn sync_repository(
        &mut self,
        repository: &RepositoryRecord,
        report: &mut SyncReport,
    ) -> Result<RepositoryOutcome, SyncError> {
        let (Some(name), Some(commits_url), Some(pushed_at)) = (
            repository.name.as_deref().and_then(RepositoryName::new),
            repository.commits_url.as_deref().filter(|url| !url.is_empty()),
            repository.pushed_at.as_deref(),
        ) else {
            debug!("repository entry incomplete; skipping");
            return Ok(RepositoryOutcome::Incomplete);
        };

        let stored = self.watermarks.get(&name).await?;
        if !stored.is_before(pushed_at) {
            debug!(watermark = %stored, pushed_at, "no activity since last run");
            return Ok(RepositoryOutcome::UpToDate);
        }

        let mut high_water = stored.clone();
        let mut cursor = CommitCursor::First {
            commits_url: commits_url.to_string(),
            since: stored.clone(),
        };

        loop {
            let page = self.source.fetch_commit_page(&cursor).await?;
            report.commit_pages += 1;

            for entry in &page.commits {
                let Some(author) = entry.author() else {
                    continue;
                };
                report.commits_scanned += 1;

                if high_water.is_before(author.date) {
                    high_water = Watermark::new(author.date);
                }
                if !author.email.ends_with(&self.settings.allowed_email_domain) {
                    continue;
                }
                if stored.is_before(author.date) {
                    let event = EventRecord::from_commit(&name, author)?;
                    let outcome = self.dispatcher.enqueue(event).await?;
                    report.events_enqueued += 1;
                    record_dispatch(report, outcome);
                }
            }

            match page.next {
                Some(next) => cursor = CommitCursor::Next(next),
                None => break,
            }
        }

        if high_water == stored {
            high_water = Watermark::new(pushed_at);
        }
        self.watermarks.set(&name, &high_water).await?;
        info!(watermark = %high_water, "watermark advanced");

        let outcome = self.dispatcher.flush().await?;
        record_dispatch(report, outcome);

        Ok(RepositoryOutcome::Synced)
    }
}

fn record_dispatch(report: &mut SyncReport, outcome: DispatchOutcome) {
    match outcome {
        DispatchOutcome::Buffered { .. } => {}
        DispatchOutcome::Delivered { .. } => report.batches_delivered += 1,
        DispatchOutcome::Rejected { .. } => report.batches_rejected += 1,
    }
}
