//! Run Orchestrator: fetch, translate, send, account.
//!
//! One run walks Fetching → Sending → Done, or Aborted on the first
//! classified failure. There is no per-node continue-on-error policy:
//! a single bad translation or delivery kills the whole run.

use crate::config::{Config, TrapConfig, SEND_INTERVAL_MS};
use crate::error::RunError;
use crate::fetcher::{NodeFetcher, NodeSource};
use crate::sender::{TrapDelivery, TrapSender};
use crate::telemetry::Telemetry;
use crate::translator::{build_varbinds, coerce_node_id};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
enum RunPhase {
    Fetching,
    Sending,
    Done,
    Aborted,
}

/// Aggregate timing for one completed run. Emitted to the execution log
/// and returned to the caller; never emitted for an aborted run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub fetched_at: DateTime<Utc>,
    /// Nodes actually processed (after any `--limit` cap).
    pub node_count: usize,
    pub fetch_duration: Duration,
    pub send_duration: Duration,
}

pub struct Orchestrator<F, S> {
    fetcher: F,
    sender: S,
    trap: TrapConfig,
    telemetry: Telemetry,
    limit: Option<usize>,
}

impl Orchestrator<NodeFetcher, TrapSender> {
    /// Wire up the production fetcher and sender from configuration.
    pub fn from_config(config: &Config, telemetry: Telemetry) -> Result<Self> {
        Ok(Self::new(
            NodeFetcher::new(config.api.clone())?,
            TrapSender::new(config.trap.clone()),
            config.trap.clone(),
            telemetry,
        ))
    }
}

impl<F: NodeSource, S: TrapDelivery> Orchestrator<F, S> {
    pub fn new(fetcher: F, sender: S, trap: TrapConfig, telemetry: Telemetry) -> Self {
        Self {
            fetcher,
            sender,
            trap,
            telemetry,
            limit: None,
        }
    }

    /// Cap the number of nodes processed in one run.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn enter(run_id: Uuid, phase: RunPhase) {
        debug!("run {} entering {:?} phase", run_id, phase);
    }

    /// Execute one full run.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        info!("Starting trap run {}", run_id);
        Self::enter(run_id, RunPhase::Fetching);

        let fetched_at = Utc::now();
        let fetch_start = Instant::now();
        let mut nodes = match self.fetcher.fetch_nodes().await {
            Ok(nodes) => nodes,
            Err(source) => {
                Self::enter(run_id, RunPhase::Aborted);
                let err = RunError::Fetch(source);
                self.telemetry.record_fatal(run_id, &err);
                return Err(err);
            }
        };
        let fetch_duration = fetch_start.elapsed();
        self.telemetry
            .record_fetch(run_id, fetched_at, nodes.len(), fetch_duration);

        if let Some(limit) = self.limit {
            if nodes.len() > limit {
                info!(
                    "run {}: limiting to {} of {} fetched node(s)",
                    run_id,
                    limit,
                    nodes.len()
                );
                nodes.truncate(limit);
            }
        }

        Self::enter(run_id, RunPhase::Sending);
        let node_count = nodes.len();
        let send_start = Instant::now();

        // Minimum-interval pacer: successive send starts are at least
        // SEND_INTERVAL_MS apart so the receiver is never overrun. The
        // first tick fires immediately.
        let mut pacer = tokio::time::interval(Duration::from_millis(SEND_INTERVAL_MS));
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for (position, node) in nodes.into_iter().enumerate() {
            pacer.tick().await;

            let node_id = match coerce_node_id(&node) {
                Ok(id) => id,
                Err(source) => {
                    Self::enter(run_id, RunPhase::Aborted);
                    let err = RunError::Translate { position, source };
                    self.telemetry.record_fatal(run_id, &err);
                    return Err(err);
                }
            };
            let varbinds = match build_varbinds(&node, &self.trap) {
                Ok(varbinds) => varbinds,
                Err(source) => {
                    Self::enter(run_id, RunPhase::Aborted);
                    let err = RunError::Translate { position, source };
                    self.telemetry.record_fatal(run_id, &err);
                    return Err(err);
                }
            };

            if let Err(source) = self.sender.send_trap(&varbinds).await {
                Self::enter(run_id, RunPhase::Aborted);
                let err = RunError::Delivery { node_id, source };
                self.telemetry.record_fatal(run_id, &err);
                return Err(err);
            }
            debug!(
                "run {}: trap sent for node {} ({}/{})",
                run_id,
                node_id,
                position + 1,
                node_count
            );
        }

        let send_duration = send_start.elapsed();
        Self::enter(run_id, RunPhase::Done);

        let summary = RunSummary {
            fetched_at,
            node_count,
            fetch_duration,
            send_duration,
        };
        self.telemetry.record_run_summary(run_id, &summary);
        info!(
            "Trap run {} complete: {} node(s) in {:.3}s",
            run_id,
            summary.node_count,
            summary.send_duration.as_secs_f64()
        );
        Ok(summary)
    }
}
