//! commit-sync entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Load configuration** from the environment and validate it.
//! 2. **Wire observability** — `tracing-subscriber` with a JSON layer and, when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure** — `GithubSource`, `RedisWatermarkStore` and
//!    `HttpEventSink` — and inject them into a `SyncOrchestrator`.
//! 4. **Run once** to completion. The process exits non-zero on any fatal
//!    error; scheduling repeated runs is left to the caller (cron, systemd
//!    timers, ...).

mod config;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use engine::{BatchDispatcher, SyncOrchestrator};
use github::GithubSource;
use sink::HttpEventSink;
use store::RedisWatermarkStore;

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("commit-sync: {e}");
            return ExitCode::FAILURE;
        }
    };

    let telemetry = match telemetry::init(config.otlp_endpoint.as_deref()) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("commit-sync: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let code = match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "sync run aborted");
            ExitCode::FAILURE
        }
    };

    telemetry.shutdown();
    code
}

async fn run(config: CliConfig) -> anyhow::Result<()> {
    let source = GithubSource::new(&config.github).context("building GitHub client")?;
    let watermarks = RedisWatermarkStore::connect(&config.redis)
        .await
        .context("connecting to watermark store")?;
    let sink = HttpEventSink::new(&config.sink_url, config.sink_timeout)
        .context("building sink client")?;

    let dispatcher = BatchDispatcher::new(Arc::new(sink));
    let mut orchestrator = SyncOrchestrator::new(
        Arc::new(source),
        Arc::new(watermarks),
        dispatcher,
        config.settings,
    );

    tracing::info!(
        run_id = %orchestrator.run_id(),
        organization = %config.github.organization,
        "starting sync run"
    );
    let report = orchestrator.run().await.context("synchronising commits")?;
    tracing::info!(
        repositories = report.repositories_listed,
        synced = report.repositories_synced,
        events = report.events_enqueued,
        batches_rejected = report.batches_rejected,
        events_pending = report.events_pending,
        "sync run finished"
    );
    Ok(())
}
