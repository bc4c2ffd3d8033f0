use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub poll_cycles: Arc<AtomicU64>,
    pub poll_failures: Arc<AtomicU64>,

    pub intervals_routed: Arc<AtomicU64>,
    pub intervals_rejected: Arc<AtomicU64>,
    pub intervals_unrouted: Arc<AtomicU64>,

    pub notifications_emitted: Arc<AtomicU64>,

    // dispatch outcomes
    pub dispatch_succeeded: Arc<AtomicU64>,
    pub dispatch_failed: Arc<AtomicU64>,
    pub dispatch_dropped: Arc<AtomicU64>,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
