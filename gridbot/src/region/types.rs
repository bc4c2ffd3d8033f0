use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use corelib::models::{Interval, RegionId};

use crate::peak::{Announcement, PeakRecord};

/// Messages accepted by a region worker's inbox.
///
/// A batch is every `Interval` received between two `EndOfBatch` markers.
#[derive(Debug)]
pub enum WorkerMessage {
    Interval(Interval),
    EndOfBatch {
        now: DateTime<Utc>,
        ack: oneshot::Sender<BatchOutcome>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Draining,
    Deciding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Queued,
    /// Dispatch queue full or closed; the announcement is still recorded.
    Dropped,
}

/// Result of one region's decision phase.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub region: RegionId,
    pub intervals: usize,
    pub rejected: usize,
    pub peak: PeakRecord,
    pub announcement: Option<Announcement>,
    pub dispatch: Option<DispatchStatus>,
}

/// Summary of one poll cycle across all regions.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub trace_id: String,
    pub received: usize,
    pub routed: usize,
    pub rejected: usize,
    pub unrouted: usize,
    pub outcomes: Vec<BatchOutcome>,
    pub failed_regions: Vec<RegionId>,
}

impl CycleReport {
    pub fn outcome(&self, region: RegionId) -> Option<&BatchOutcome> {
        self.outcomes.iter().find(|o| o.region == region)
    }

    pub fn announcements(&self) -> impl Iterator<Item = &Announcement> {
        self.outcomes.iter().filter_map(|o| o.announcement.as_ref())
    }
}
