use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use super::region::{RegionId, ZoneTable};

/// Format of `SETTLEMENTDATE`, e.g. `2024-01-30T16:35:00`.
const SETTLEMENT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntervalError {
    #[error("unknown region id: {0}")]
    UnknownRegion(String),

    #[error("invalid period type: {0}")]
    InvalidPeriodType(String),

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("invalid settlement date {value:?}: {reason}")]
    InvalidSettlementDate { value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Forecast,
    Actual,
}

impl FromStr for PeriodType {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FORECAST" => Ok(PeriodType::Forecast),
            "ACTUAL" => Ok(PeriodType::Actual),
            other => Err(IntervalError::InvalidPeriodType(other.to_string())),
        }
    }
}

/// One record of the AEMO `5MIN` report, as published.
///
/// Identifying fields are optional so a record with a null or missing value
/// still decodes and is rejected on its own by [`Interval::from_raw`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInterval {
    #[serde(rename = "SETTLEMENTDATE", default)]
    pub settlement_date: Option<String>,
    #[serde(rename = "REGIONID", default)]
    pub region_id: Option<String>,
    #[serde(rename = "REGION", default)]
    pub region: Option<String>,
    #[serde(rename = "RRP", default)]
    pub rrp: Option<f64>,
    #[serde(rename = "TOTALDEMAND", default)]
    pub total_demand: f64,
    #[serde(rename = "PERIODTYPE", default)]
    pub period_type: Option<String>,
    #[serde(rename = "NETINTERCHANGE", default)]
    pub net_interchange: f64,
    #[serde(rename = "SCHEDULEDGENERATION", default)]
    pub scheduled_generation: f64,
    #[serde(rename = "SEMISCHEDULEDGENERATION", default)]
    pub semi_scheduled_generation: f64,
}

/// A validated price record for one region and settlement time.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub settlement: DateTime<FixedOffset>,
    pub region: RegionId,
    pub period_type: PeriodType,
    /// Regional reference price, $/MWh. May be negative.
    pub rrp: f64,

    pub total_demand: f64,
    pub net_interchange: f64,
    pub scheduled_generation: f64,
    pub semi_scheduled_generation: f64,
}

impl RawInterval {
    /// Builds a record with the fields the decision path reads.
    pub fn new(region_id: &str, period_type: &str, settlement_date: &str, rrp: f64) -> Self {
        Self {
            settlement_date: Some(settlement_date.to_string()),
            region_id: Some(region_id.to_string()),
            region: Some(region_id.to_string()),
            rrp: Some(rrp),
            period_type: Some(period_type.to_string()),
            ..Self::default()
        }
    }
}

impl Interval {
    pub fn new(
        region: RegionId,
        period_type: PeriodType,
        settlement: DateTime<FixedOffset>,
        rrp: f64,
    ) -> Self {
        Self {
            settlement,
            region,
            period_type,
            rrp,
            total_demand: 0.0,
            net_interchange: 0.0,
            scheduled_generation: 0.0,
            semi_scheduled_generation: 0.0,
        }
    }

    /// Validates a raw record and pins its naive timestamp to the region's zone.
    pub fn from_raw(raw: &RawInterval, zones: &ZoneTable) -> Result<Self, IntervalError> {
        let region: RegionId = required(&raw.region_id, "REGIONID")?.parse()?;
        let period_type: PeriodType = required(&raw.period_type, "PERIODTYPE")?.parse()?;
        let settlement_date = required(&raw.settlement_date, "SETTLEMENTDATE")?;
        let rrp = raw.rrp.ok_or(IntervalError::MissingField("RRP"))?;

        let naive = NaiveDateTime::parse_from_str(settlement_date, SETTLEMENT_DATE_FORMAT)
            .map_err(|e| IntervalError::InvalidSettlementDate {
                value: settlement_date.to_string(),
                reason: e.to_string(),
            })?;

        let settlement = naive
            .and_local_timezone(zones.offset_for(region))
            .single()
            .ok_or_else(|| IntervalError::InvalidSettlementDate {
                value: settlement_date.to_string(),
                reason: "not representable in region zone".into(),
            })?;

        Ok(Self {
            settlement,
            region,
            period_type,
            rrp,
            total_demand: raw.total_demand,
            net_interchange: raw.net_interchange,
            scheduled_generation: raw.scheduled_generation,
            semi_scheduled_generation: raw.semi_scheduled_generation,
        })
    }

    pub fn is_forecast(&self) -> bool {
        self.period_type == PeriodType::Forecast
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, IntervalError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(IntervalError::MissingField(field))
}
