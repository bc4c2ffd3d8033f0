//! Per-region batch worker.
//!
//! Each configured region owns one worker task. The worker buffers the
//! intervals of the current batch and only decides once the orchestrator sends
//! the end-of-batch marker: deciding on a partial batch could announce a peak
//! that a later interval of the same batch supersedes.
//!
//! The worker is the only owner of its region's `AnnouncedState`. It never
//! talks to Mastodon directly; messages are handed to the region's dispatcher
//! through a bounded queue so a slow post cannot hold up the next poll cycle.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{Instrument, debug, error, info, warn};

use corelib::models::{Interval, RegionId};

use crate::logger::region_span;
use crate::metrics::Counters;
use crate::peak::decision::intro_message;
use crate::peak::{AnnouncedState, DecisionEngine, PeakTracker};
use crate::region::types::{BatchOutcome, DispatchStatus, WorkerMessage, WorkerState};

pub struct RegionWorker {
    region: RegionId,
    tracker: PeakTracker,
    engine: DecisionEngine,
    state: WorkerState,
    announced: AnnouncedState,
    batch: Vec<Interval>,
    rejected: usize,
    dispatch_tx: Sender<String>,
    counters: Counters,
}

impl RegionWorker {
    pub fn new(
        region: RegionId,
        tracker: PeakTracker,
        engine: DecisionEngine,
        dispatch_tx: Sender<String>,
        counters: Counters,
    ) -> Self {
        Self {
            region,
            tracker,
            engine,
            state: WorkerState::Idle,
            announced: AnnouncedState::default(),
            batch: Vec::new(),
            rejected: 0,
            dispatch_tx,
            counters,
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn announced(&self) -> &AnnouncedState {
        &self.announced
    }

    /// Queues the startup test status.
    pub fn send_intro(&self) -> DispatchStatus {
        self.enqueue(intro_message(self.region.display_name()))
    }

    /// Adds an interval to the current batch.
    ///
    /// Intervals for another region are dropped and counted; the batch carries on.
    pub fn ingest(&mut self, interval: Interval) {
        if interval.region != self.region {
            self.rejected += 1;
            Counters::incr(&self.counters.intervals_rejected);
            warn!(
                expected = %self.region,
                got = %interval.region,
                "dropping interval routed to the wrong region"
            );
            return;
        }

        if self.state == WorkerState::Idle {
            self.state = WorkerState::Draining;
            debug!("batch started");
        }

        debug!(rrp = interval.rrp, time = %interval.settlement, "processed interval");
        self.batch.push(interval);
    }

    /// Closes the current batch: computes the peak, decides and enqueues any
    /// announcement. An empty batch is decided like any other.
    pub fn finish_batch(&mut self, now: DateTime<Utc>) -> BatchOutcome {
        self.state = WorkerState::Deciding;

        let batch = std::mem::take(&mut self.batch);
        let rejected = std::mem::take(&mut self.rejected);

        let peak = self.tracker.peak(&batch, now);
        let announcement = self.engine.evaluate(self.region, &peak, &mut self.announced);

        let dispatch = announcement.as_ref().map(|a| {
            info!(
                kind = ?a.notification.kind(),
                toot = %a.message,
                "toot!"
            );
            Counters::incr(&self.counters.notifications_emitted);
            self.enqueue(a.message.clone())
        });

        debug!(
            intervals = batch.len(),
            peak_rrp = peak.price,
            no_peak = peak.is_sentinel(),
            announced = announcement.is_some(),
            "batch decided"
        );

        self.state = WorkerState::Idle;

        BatchOutcome {
            region: self.region,
            intervals: batch.len(),
            rejected,
            peak,
            announcement,
            dispatch,
        }
    }

    fn enqueue(&self, message: String) -> DispatchStatus {
        match self.dispatch_tx.try_send(message) {
            Ok(()) => DispatchStatus::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                Counters::incr(&self.counters.dispatch_dropped);
                warn!("dispatch queue full; dropping toot");
                DispatchStatus::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Counters::incr(&self.counters.dispatch_dropped);
                error!("dispatcher gone; dropping toot");
                DispatchStatus::Dropped
            }
        }
    }

    /// Worker loop. Runs until the inbox closes and never panics.
    pub async fn run(mut self, mut rx: Receiver<WorkerMessage>) {
        let span = region_span("worker", self.region);

        async move {
            info!("launching gridbot worker");

            while let Some(msg) = rx.recv().await {
                match msg {
                    WorkerMessage::Interval(interval) => self.ingest(interval),
                    WorkerMessage::EndOfBatch { now, ack } => {
                        let outcome = self.finish_batch(now);
                        if ack.send(outcome).is_err() {
                            warn!("orchestrator stopped waiting for batch outcome");
                        }
                    }
                }
            }

            if self.state == WorkerState::Draining {
                warn!(
                    intervals = self.batch.len(),
                    "inbox closed mid-batch; discarding partial batch"
                );
            }

            warn!("worker exiting");
        }
        .instrument(span)
        .await
    }
}
