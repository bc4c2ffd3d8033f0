//! AEMO report poller
//!
//! Fetches the 5-minute report on a fixed cadence and hands each report to the
//! orchestrator as one batch. A failed fetch skips the cycle; nothing is routed
//! and no worker state changes.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::aemo::client::AemoClient;
use crate::metrics::Counters;
use crate::region::RegionOrchestrator;

/// Runs the poll loop until `shutdown` flips to `true` or its sender is dropped.
///
/// Data flow:
/// AEMO → Poller → Orchestrator → Region workers → Dispatchers
pub async fn run_aemo_poller(
    client: AemoClient,
    orchestrator: &RegionOrchestrator,
    poll_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticker = interval(poll_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        regions = orchestrator.registry().len(),
        every_secs = poll_every.as_secs(),
        "aemo poller started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let report = match client
            .fetch_report()
            .await
            .context("failed to fetch aemo report")
        {
            Ok(report) => report,
            Err(e) => {
                Counters::incr(&orchestrator.counters().poll_failures);
                warn!(error = ?e, "poll cycle skipped");
                continue;
            }
        };

        orchestrator.run_cycle(report).await;
    }

    info!("aemo poller stopped");
    Ok(())
}
