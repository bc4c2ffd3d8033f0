pub mod decision;
pub mod tracker;

pub use decision::{
    AnnouncedState, Announcement, DecisionEngine, Notification, NotificationKind, Thresholds,
};
pub use tracker::{PeakRecord, PeakTracker};
