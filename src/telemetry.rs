//! Owned logging handle for the trap pipeline.
//!
//! Two append-only streams: an error log (every ERROR-level event) and
//! an execution log (audit records: fetch timing/count, send
//! timing/count). The handle owns the non-blocking writer guards, so
//! sinks flush when the handle drops instead of living in process-wide
//! statics; the orchestrator receives it as an explicit capability.

use crate::config::LoggingConfig;
use crate::orchestrator::RunSummary;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;

/// Event target routed to the execution log.
pub const EXECUTION_TARGET: &str = "bifrost::execution";

pub struct Telemetry {
    _guards: Vec<WorkerGuard>,
}

impl Telemetry {
    /// Install the subscriber and open both log streams.
    ///
    /// Call once per process; the returned handle must outlive the run
    /// or buffered records are lost.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let mut guards = Vec::new();
        let mut layers = Vec::new();

        let (error_writer, guard) = tracing_appender::non_blocking(appender(&config.error_log)?);
        guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(error_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
        );

        let (exec_writer, guard) = tracing_appender::non_blocking(appender(&config.execution_log)?);
        guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(exec_writer)
                .with_ansi(false)
                .with_target(false)
                .with_level(false)
                .with_filter(filter::filter_fn(|meta| meta.target() == EXECUTION_TARGET))
                .boxed(),
        );

        if config.console_output {
            let level = match config.level.as_str() {
                "trace" => tracing::Level::TRACE,
                "debug" => tracing::Level::DEBUG,
                "info" => tracing::Level::INFO,
                "warn" => tracing::Level::WARN,
                "error" => tracing::Level::ERROR,
                _ => tracing::Level::INFO,
            };
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_filter(filter::LevelFilter::from_level(level))
                    .boxed(),
            );
        }

        tracing_subscriber::registry().with(layers).init();
        Ok(Self { _guards: guards })
    }

    /// A handle that installs nothing. For tests and embedding.
    pub fn disabled() -> Self {
        Self { _guards: Vec::new() }
    }

    /// Audit record: the node list arrived.
    pub fn record_fetch(
        &self,
        run_id: Uuid,
        fetched_at: chrono::DateTime<chrono::Utc>,
        node_count: usize,
        fetch_duration: std::time::Duration,
    ) {
        info!(
            target: EXECUTION_TARGET,
            "run {} | API fetch at {} | nodes={} | fetch_time={:.3}s",
            run_id,
            fetched_at.to_rfc3339(),
            node_count,
            fetch_duration.as_secs_f64(),
        );
    }

    /// Audit record: every trap went out; the run is complete.
    pub fn record_run_summary(&self, run_id: Uuid, summary: &RunSummary) {
        info!(
            target: EXECUTION_TARGET,
            "run {} | Trap send completed | nodes_sent={} | send_time={:.3}s",
            run_id,
            summary.node_count,
            summary.send_duration.as_secs_f64(),
        );
    }

    /// The run died; make sure the error log has the full story.
    pub fn record_fatal(&self, run_id: Uuid, error: &dyn std::fmt::Display) {
        error!("run {} aborted: {}", run_id, error);
    }
}

fn appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(dir).context("Failed to create log directory")?;
    Ok(tracing_appender::rolling::never(dir, file_name))
}
