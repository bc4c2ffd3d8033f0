//! Poll-cycle fan-out.
//!
//! Splits each fetched report by region, feeds every region worker its share
//! followed by exactly one end-of-batch marker (even when the share is empty),
//! and waits for every worker to finish deciding before the cycle returns.
//!
//! Guarantees:
//! - one cycle at a time; a new batch never starts draining into a worker
//!   that is still deciding the previous one
//! - invalid records are dropped individually and never stop routing
//! - a dead worker is reported, its siblings carry on

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::mpsc::{self, Sender};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use corelib::models::{Interval, RawInterval, RegionId};

use crate::config::AppConfig;
use crate::logger::{TraceId, annotate_intervals, cycle_span};
use crate::mastodon::Publisher;
use crate::metrics::Counters;
use crate::peak::{DecisionEngine, PeakTracker};
use crate::region::dispatcher::Dispatcher;
use crate::region::registry::{RegionEntry, RegionRegistry};
use crate::region::types::{BatchOutcome, CycleReport, WorkerMessage};
use crate::region::worker::RegionWorker;

#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub tracker: PeakTracker,
    pub engine: DecisionEngine,
    /// Per-worker inbox size. Senders wait when it is full.
    pub inbox_capacity: usize,
    pub dispatch_queue_capacity: usize,
    pub send_intro: bool,
}

impl WorkerSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            tracker: PeakTracker::new(cfg.forecast_horizon),
            engine: DecisionEngine::new(cfg.thresholds),
            dispatch_queue_capacity: cfg.dispatch_queue_capacity,
            send_intro: cfg.send_intro,
            ..Self::default()
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            tracker: PeakTracker::default(),
            engine: DecisionEngine::default(),
            inbox_capacity: 256,
            dispatch_queue_capacity: 16,
            send_intro: false,
        }
    }
}

struct WorkerHandle {
    inbox: Sender<WorkerMessage>,
    worker: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

pub struct RegionOrchestrator {
    registry: RegionRegistry,
    workers: BTreeMap<RegionId, WorkerHandle>,
    counters: Counters,
    cycle_lock: Mutex<()>,
}

impl RegionOrchestrator {
    /// Spawns one worker and one dispatcher per registered region.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P, F>(
        registry: RegionRegistry,
        settings: WorkerSettings,
        counters: Counters,
        mut make_publisher: F,
    ) -> Self
    where
        P: Publisher,
        F: FnMut(&RegionEntry) -> P,
    {
        let mut workers = BTreeMap::new();

        for entry in registry.entries() {
            let region = entry.region;
            let (dispatch_tx, dispatch_rx) = mpsc::channel(settings.dispatch_queue_capacity.max(1));
            let (inbox, inbox_rx) = mpsc::channel(settings.inbox_capacity.max(8));

            let dispatcher = Dispatcher::new(region, make_publisher(entry), counters.clone());
            let worker = RegionWorker::new(
                region,
                settings.tracker,
                settings.engine,
                dispatch_tx,
                counters.clone(),
            );

            if settings.send_intro {
                worker.send_intro();
            }

            let dispatcher = tokio::spawn(dispatcher.run(dispatch_rx));
            let worker = tokio::spawn(worker.run(inbox_rx));

            info!(component = "orchestrator", %region, "spawned region worker");

            workers.insert(
                region,
                WorkerHandle {
                    inbox,
                    worker,
                    dispatcher,
                },
            );
        }

        Self {
            registry,
            workers,
            counters,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub async fn run_cycle(&self, batch: Vec<RawInterval>) -> CycleReport {
        self.run_cycle_at(batch, Utc::now()).await
    }

    /// Runs one poll cycle with an explicit reference time.
    pub async fn run_cycle_at(&self, batch: Vec<RawInterval>, now: DateTime<Utc>) -> CycleReport {
        let trace_id = TraceId::generate();
        let span = cycle_span(&trace_id);

        async move {
            // Serialises cycles: the previous cycle holds this until every
            // worker has acknowledged its end of batch.
            let _cycle = self.cycle_lock.lock().await;
            annotate_intervals(batch.len());

            let mut report = CycleReport {
                trace_id: trace_id.as_str().to_string(),
                received: batch.len(),
                ..CycleReport::default()
            };

            let mut shares = self.partition(&batch, &mut report);

            let mut pending = Vec::with_capacity(self.workers.len());
            for (region, handle) in &self.workers {
                let share = shares.remove(region).unwrap_or_default();
                let count = share.len();

                match Self::deliver(handle, share, now).await {
                    Ok(done) => {
                        report.routed += count;
                        pending.push((*region, done));
                    }
                    Err(e) => {
                        error!(
                            component = "orchestrator",
                            %region,
                            error = ?e,
                            "failed to deliver batch; region skipped this cycle"
                        );
                        report.failed_regions.push(*region);
                    }
                }
            }

            let acks = join_all(
                pending
                    .into_iter()
                    .map(|(region, done)| async move { (region, done.await) }),
            )
            .await;

            for (region, ack) in acks {
                match ack {
                    Ok(outcome) => report.outcomes.push(outcome),
                    Err(_) => {
                        error!(component = "orchestrator", %region, "worker dropped batch acknowledgement");
                        report.failed_regions.push(region);
                    }
                }
            }

            Counters::incr(&self.counters.poll_cycles);
            Counters::add(&self.counters.intervals_routed, report.routed as u64);
            Counters::add(&self.counters.intervals_rejected, report.rejected as u64);
            Counters::add(&self.counters.intervals_unrouted, report.unrouted as u64);

            info!(
                routed = report.routed,
                rejected = report.rejected,
                unrouted = report.unrouted,
                announcements = report.announcements().count(),
                "poll cycle complete"
            );

            report
        }
        .instrument(span)
        .await
    }

    /// Validates raw records and groups them by configured region.
    fn partition(
        &self,
        batch: &[RawInterval],
        report: &mut CycleReport,
    ) -> BTreeMap<RegionId, Vec<Interval>> {
        let mut shares: BTreeMap<RegionId, Vec<Interval>> = BTreeMap::new();

        for raw in batch {
            match Interval::from_raw(raw, self.registry.zones()) {
                Ok(interval) if self.workers.contains_key(&interval.region) => {
                    shares.entry(interval.region).or_default().push(interval);
                }
                Ok(interval) => {
                    report.unrouted += 1;
                    debug!(region = %interval.region, "no worker for region; skipping interval");
                }
                Err(e) => {
                    report.rejected += 1;
                    warn!(
                        error = %e,
                        region_id = ?raw.region_id,
                        period_type = ?raw.period_type,
                        "dropping invalid interval"
                    );
                }
            }
        }

        shares
    }

    async fn deliver(
        handle: &WorkerHandle,
        share: Vec<Interval>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<oneshot::Receiver<BatchOutcome>> {
        for interval in share {
            handle
                .inbox
                .send(WorkerMessage::Interval(interval))
                .await
                .map_err(|_| anyhow::anyhow!("worker inbox closed"))?;
        }

        let (ack, done) = oneshot::channel();
        handle
            .inbox
            .send(WorkerMessage::EndOfBatch { now, ack })
            .await
            .map_err(|_| anyhow::anyhow!("worker inbox closed"))?;

        Ok(done)
    }

    /// Closes every worker inbox and waits for workers and dispatchers to drain.
    ///
    /// Cycles borrow the orchestrator, so none can be in flight here.
    pub async fn shutdown(self) {
        info!(component = "orchestrator", "shutting down region workers");

        for (region, handle) in self.workers {
            let WorkerHandle {
                inbox,
                worker,
                dispatcher,
            } = handle;
            drop(inbox);

            if let Err(e) = worker.await {
                error!(%region, error = ?e, "region worker panicked");
            }
            // The worker owned the dispatch sender; the dispatcher drains and exits.
            if let Err(e) = dispatcher.await {
                error!(%region, error = ?e, "dispatcher panicked");
            }
        }

        info!(component = "orchestrator", "shutdown complete");
    }
}
