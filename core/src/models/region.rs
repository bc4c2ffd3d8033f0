use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::FixedOffset;

use super::interval::IntervalError;

/// NEM market time (AEST, no daylight saving).
pub const MARKET_UTC_OFFSET_SECS: i32 = 10 * 3600;

/// Regions of the National Electricity Market that can be tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionId {
    Qld1,
    Nsw1,
    Sa1,
    Tas1,
    Vic1,
}

impl RegionId {
    pub const ALL: [RegionId; 5] = [
        RegionId::Qld1,
        RegionId::Nsw1,
        RegionId::Sa1,
        RegionId::Tas1,
        RegionId::Vic1,
    ];

    /// Upstream identifier, e.g. `QLD1`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionId::Qld1 => "QLD1",
            RegionId::Nsw1 => "NSW1",
            RegionId::Sa1 => "SA1",
            RegionId::Tas1 => "TAS1",
            RegionId::Vic1 => "VIC1",
        }
    }

    /// Human readable name used in announcements.
    pub fn display_name(&self) -> &'static str {
        match self {
            RegionId::Qld1 => "Queensland",
            RegionId::Nsw1 => "New South Wales",
            RegionId::Sa1 => "South Australia",
            RegionId::Tas1 => "Tasmania",
            RegionId::Vic1 => "Victoria",
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionId {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionId::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| IntervalError::UnknownRegion(s.to_string()))
    }
}

/// Region -> UTC offset table used to interpret naive settlement timestamps.
///
/// AEMO publishes settlement dates without zone information. Every region is
/// read in one default offset unless an override is configured; this does not
/// track daylight saving in the southern states.
#[derive(Debug, Clone)]
pub struct ZoneTable {
    default: FixedOffset,
    overrides: HashMap<RegionId, FixedOffset>,
}

impl ZoneTable {
    pub fn uniform(default: FixedOffset) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, region: RegionId, offset: FixedOffset) -> Self {
        self.overrides.insert(region, offset);
        self
    }

    pub fn offset_for(&self, region: RegionId) -> FixedOffset {
        self.overrides.get(&region).copied().unwrap_or(self.default)
    }
}

impl Default for ZoneTable {
    fn default() -> Self {
        let market = FixedOffset::east_opt(MARKET_UTC_OFFSET_SECS)
            .expect("market offset is within range");
        Self::uniform(market)
    }
}
