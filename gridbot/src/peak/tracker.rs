//! Batch peak reduction.
//!
//! Reduces one region's batch of intervals to the highest forecast price that
//! settles within the forecast horizon. ACTUAL records never take part, and a
//! batch with no qualifying record yields the sentinel peak.

use chrono::{DateTime, Duration, FixedOffset, Utc};

use corelib::models::Interval;

/// Price used to mark "no peak in this batch". Far below any real RRP.
pub const SENTINEL_PRICE: f64 = -20_000.0;

/// Forecasts further ahead than this are considered unreliable.
pub const DEFAULT_HORIZON_HOURS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRecord {
    pub price: f64,
    pub time: Option<DateTime<FixedOffset>>,
}

impl PeakRecord {
    pub const fn sentinel() -> Self {
        Self {
            price: SENTINEL_PRICE,
            time: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.time.is_none()
    }
}

impl Default for PeakRecord {
    fn default() -> Self {
        Self::sentinel()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PeakTracker {
    horizon: Duration,
}

impl PeakTracker {
    pub fn new(horizon: Duration) -> Self {
        Self { horizon }
    }

    /// Returns `true` when the interval may take part in the peak.
    pub fn qualifies(&self, interval: &Interval, now: DateTime<Utc>) -> bool {
        interval.is_forecast() && interval.settlement.with_timezone(&Utc) <= now + self.horizon
    }

    /// Computes the batch peak.
    ///
    /// Ties keep the earliest-seen interval. Any tie-break would do; this one
    /// only falls out of the strict comparison.
    pub fn peak<'a, I>(&self, intervals: I, now: DateTime<Utc>) -> PeakRecord
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        intervals
            .into_iter()
            .filter(|i| self.qualifies(i, now))
            .fold(PeakRecord::sentinel(), |best, i| {
                if i.rrp > best.price {
                    PeakRecord {
                        price: i.rrp,
                        time: Some(i.settlement),
                    }
                } else {
                    best
                }
            })
    }
}

impl Default for PeakTracker {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_HORIZON_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::models::{PeriodType, RegionId};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-30T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn at(hours_from_now: i64, minutes: i64) -> DateTime<FixedOffset> {
        let aest = FixedOffset::east_opt(10 * 3600).unwrap();
        (now() + Duration::hours(hours_from_now) + Duration::minutes(minutes)).with_timezone(&aest)
    }

    fn forecast(rrp: f64, time: DateTime<FixedOffset>) -> Interval {
        Interval::new(RegionId::Qld1, PeriodType::Forecast, time, rrp)
    }

    #[test]
    fn empty_batch_is_sentinel() {
        let peak = PeakTracker::default().peak(&Vec::<Interval>::new(), now());
        assert!(peak.is_sentinel());
        assert_eq!(peak.price, SENTINEL_PRICE);
    }

    #[test]
    fn picks_highest_forecast() {
        let batch = vec![
            forecast(750.0, at(1, 0)),
            forecast(1500.0, at(2, 0)),
            forecast(750.0, at(3, 0)),
        ];

        let peak = PeakTracker::default().peak(&batch, now());
        assert_eq!(peak.price, 1500.0);
        assert_eq!(peak.time, Some(at(2, 0)));
    }

    #[test]
    fn actual_records_never_contribute() {
        let mut actual = forecast(15_000.0, at(0, -30));
        actual.period_type = PeriodType::Actual;
        let batch = vec![actual, forecast(90.0, at(1, 0))];

        let peak = PeakTracker::default().peak(&batch, now());
        assert_eq!(peak.price, 90.0);
    }

    #[test]
    fn only_actual_records_yield_sentinel() {
        let mut actual = forecast(15_000.0, at(1, 0));
        actual.period_type = PeriodType::Actual;

        assert!(PeakTracker::default().peak(&[actual], now()).is_sentinel());
    }

    #[test]
    fn horizon_excludes_far_forecasts() {
        let batch = vec![forecast(300.0, at(7, 30)), forecast(9_000.0, at(8, 5))];

        let peak = PeakTracker::default().peak(&batch, now());
        assert_eq!(peak.price, 300.0);
    }

    #[test]
    fn horizon_boundary_is_inclusive() {
        let batch = vec![forecast(640.0, at(8, 0))];
        let peak = PeakTracker::default().peak(&batch, now());
        assert_eq!(peak.price, 640.0);
    }

    #[test]
    fn ties_keep_earliest_seen() {
        let batch = vec![forecast(700.0, at(3, 0)), forecast(700.0, at(1, 0))];
        let peak = PeakTracker::default().peak(&batch, now());
        assert_eq!(peak.time, Some(at(3, 0)));
    }

    #[test]
    fn negative_prices_are_real_peaks() {
        let batch = vec![forecast(-45.0, at(1, 0)), forecast(-60.0, at(2, 0))];
        let peak = PeakTracker::default().peak(&batch, now());
        assert!(!peak.is_sentinel());
        assert_eq!(peak.price, -45.0);
    }

    proptest! {
        #[test]
        fn peak_price_is_order_independent(
            prices in prop::collection::vec(-1_000.0f64..16_000.0, 0..40),
            rotate in 0usize..40,
        ) {
            let batch: Vec<Interval> = prices
                .iter()
                .enumerate()
                .map(|(i, p)| forecast(*p, at(0, (i as i64) * 5)))
                .collect();

            let mut shuffled = batch.clone();
            shuffled.reverse();
            if !shuffled.is_empty() {
                let n = rotate % shuffled.len();
                shuffled.rotate_left(n);
            }

            let tracker = PeakTracker::default();
            prop_assert_eq!(tracker.peak(&batch, now()).price, tracker.peak(&shuffled, now()).price);
        }

        #[test]
        fn peak_never_exceeds_a_qualifying_price(
            prices in prop::collection::vec(-1_000.0f64..16_000.0, 1..40),
            offsets in prop::collection::vec(0i64..16, 1..40),
        ) {
            let batch: Vec<Interval> = prices
                .iter()
                .zip(offsets.iter().cycle())
                .map(|(p, h)| forecast(*p, at(*h, 0)))
                .collect();

            let tracker = PeakTracker::default();
            let peak = tracker.peak(&batch, now());
            let best = batch
                .iter()
                .filter(|i| tracker.qualifies(i, now()))
                .map(|i| i.rrp)
                .fold(SENTINEL_PRICE, f64::max);

            prop_assert_eq!(peak.price, best);
        }
    }
}
