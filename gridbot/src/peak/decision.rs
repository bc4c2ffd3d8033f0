//! Announcement decisions.
//!
//! Compares a freshly computed batch peak against the last announced one and
//! decides whether the change deserves a post. The comparison is hysteretic:
//! small wiggles at an unchanged peak time are ignored, but a peak that drops
//! out of the interesting range is always retracted.
//!
//! The state update is optimistic. `AnnouncedState` is written before the
//! message reaches the publisher, so a failed post is not re-announced on the
//! next unchanged batch.

use chrono::{DateTime, FixedOffset};

use corelib::models::RegionId;

use crate::peak::tracker::PeakRecord;

const PRICE_EPSILON: f64 = 1e-8;

const AEMO_VISUALISATION_URL: &str =
    "https://aemo.com.au/aemo/apps/visualisations/elec-nem-priceanddemand.html";

/// Tunable announcement thresholds, in $/MWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Peaks above this price are worth announcing at all.
    pub interesting_price: f64,
    /// Minimum price change at an unchanged peak time before re-announcing.
    pub uninteresting_delta: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            interesting_price: 500.0,
            // 5 c/kWh
            uninteresting_delta: 50.0,
        }
    }
}

/// What this region last told the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnouncedState {
    pub price: f64,
    pub time: Option<DateTime<FixedOffset>>,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewPeak,
    Downgrade,
    Cancellation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewPeak {
        price: f64,
        time: DateTime<FixedOffset>,
    },
    Downgrade {
        previous_price: f64,
        price: f64,
        time: DateTime<FixedOffset>,
    },
    Cancellation {
        previous_price: f64,
        previous_time: DateTime<FixedOffset>,
    },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::NewPeak { .. } => NotificationKind::NewPeak,
            Notification::Downgrade { .. } => NotificationKind::Downgrade,
            Notification::Cancellation { .. } => NotificationKind::Cancellation,
        }
    }

    /// Renders the plain-text status for a region.
    pub fn render(&self, region_name: &str) -> String {
        match self {
            Notification::NewPeak { price, time } => format!(
                "A new {region_name} wholesale electricity price peak of ${}/kWh is predicted at {}: {AEMO_VISUALISATION_URL}",
                per_kwh(*price),
                clock(time),
            ),
            Notification::Downgrade {
                previous_price,
                price,
                time,
            } => format!(
                "The {region_name} predicted wholesale electricity price peak of ${}/kWh has been downgraded to a peak of ${}/kWh at {}: {AEMO_VISUALISATION_URL}",
                per_kwh(*previous_price),
                per_kwh(*price),
                clock(time),
            ),
            Notification::Cancellation {
                previous_price,
                previous_time,
            } => format!(
                "The {region_name} wholesale electricity price peak of ${}/kWh at {} has been averted. Thanks AEMO! {AEMO_VISUALISATION_URL}",
                per_kwh(*previous_price),
                clock(previous_time),
            ),
        }
    }
}

/// A decided notification together with its rendered text.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub region: RegionId,
    pub notification: Notification,
    pub message: String,
}

/// Startup test status for a region.
pub fn intro_message(region_name: &str) -> String {
    format!(
        "Testing, testing, 1, 2, 3. This is a test toot from the {region_name} gridbot. If you see this, it's working."
    )
}

fn per_kwh(price_per_mwh: f64) -> String {
    format!("{:.2}", price_per_mwh / 1000.0)
}

fn clock(time: &DateTime<FixedOffset>) -> String {
    time.format("%H:%M").to_string()
}

fn float_equals(a: f64, b: f64) -> bool {
    (a - b).abs() < PRICE_EPSILON
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine {
    thresholds: Thresholds,
}

impl DecisionEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Pure decision step. Rules are evaluated in order; the first match wins.
    pub fn decide(&self, peak: &PeakRecord, state: &AnnouncedState) -> Option<Notification> {
        let t = &self.thresholds;
        let same_time = peak.time == state.time;

        // Already announced.
        if float_equals(peak.price, state.price) && same_time {
            return None;
        }

        // Too small a move to be worth a post.
        if same_time && (peak.price - state.price).abs() < t.uninteresting_delta {
            return None;
        }

        // An announced interesting peak fell away: retract it, quoting the old numbers.
        if peak.price < t.interesting_price && state.price > t.interesting_price {
            return state.time.map(|previous_time| Notification::Cancellation {
                previous_price: state.price,
                previous_time,
            });
        }

        if peak.price > t.interesting_price {
            let time = peak.time?;
            if peak.price > state.price {
                return Some(Notification::NewPeak {
                    price: peak.price,
                    time,
                });
            }
            return Some(Notification::Downgrade {
                previous_price: state.price,
                price: peak.price,
                time,
            });
        }

        None
    }

    /// Decides, renders and records the announcement in `state`.
    ///
    /// `state` is updated before the caller dispatches the message.
    pub fn evaluate(
        &self,
        region: RegionId,
        peak: &PeakRecord,
        state: &mut AnnouncedState,
    ) -> Option<Announcement> {
        let notification = self.decide(peak, state)?;
        let message = notification.render(region.display_name());

        state.price = peak.price;
        state.time = peak.time;
        state.last_message = Some(message.clone());

        Some(Announcement {
            region,
            notification,
            message,
        })
    }
}
