pub mod interval;
pub mod region;

pub use interval::{Interval, IntervalError, PeriodType, RawInterval};
pub use region::{RegionId, ZoneTable};
