use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use corelib::models::{RegionId, ZoneTable};

use crate::error::ConfigError;
use crate::peak::Thresholds;
use crate::peak::tracker::DEFAULT_HORIZON_HOURS;

const DEFAULT_AEMO_HOST: &str = "https://aemo.com.au";

/// Posting credentials for one region's account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionCredentials {
    pub region: RegionId,
    pub client_id: String,
    pub client_secret: String,
    pub user_email: String,
    pub user_password: String,
}

/// One entry of `GRIDBOT_CREDENTIALS`.
#[derive(Debug, Deserialize)]
struct CredentialEntry {
    #[serde(rename = "RegionID")]
    region_id: String,
    #[serde(rename = "MastodonClientID", default)]
    client_id: String,
    #[serde(rename = "MastodonClientSecret", default)]
    client_secret: String,
    #[serde(rename = "MastodonUserEmail", default)]
    user_email: String,
    #[serde(rename = "MastodonUserPassword", default)]
    user_password: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Data source
    // =========================
    /// Base URL of the AEMO visualisation API.
    pub aemo_host: String,

    /// How often the price report is fetched.
    ///
    /// AEMO refreshes its forecasts every five minutes; polling faster only
    /// produces identical batches.
    pub poll_interval: Duration,

    // =========================
    // Decision configuration
    // =========================
    /// Announcement thresholds ($/MWh).
    pub thresholds: Thresholds,

    /// Forecasts settling later than `now + forecast_horizon` are ignored.
    pub forecast_horizon: chrono::Duration,

    /// Interprets AEMO's zone-less settlement timestamps per region.
    pub zones: ZoneTable,

    // =========================
    // Posting configuration
    // =========================
    /// Mastodon server base URL. Optional in test mode.
    pub mastodon_server: Option<String>,

    /// One entry per region that should get a worker.
    pub credentials: Vec<RegionCredentials>,

    /// Record notifications instead of posting them.
    pub test_mode: bool,

    /// Post a test status for every region on startup.
    pub send_intro: bool,

    /// Capacity of each region's dispatch queue.
    ///
    /// When full, new notifications for that region are dropped rather than
    /// blocking the next poll cycle.
    pub dispatch_queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let aemo_host = get("AEMO_HOST")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_AEMO_HOST.to_string());

        let poll_secs: u64 = parse_or(&get, "AEMO_POLL_INTERVAL_SECS", 300)?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AEMO_POLL_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            interesting_price: parse_price(&get, "INTERESTING_PEAK_RRP", defaults.interesting_price)?,
            uninteresting_delta: parse_price(
                &get,
                "UNINTERESTING_DELTA_RRP",
                defaults.uninteresting_delta,
            )?,
        };
        if thresholds.uninteresting_delta < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "UNINTERESTING_DELTA_RRP",
                reason: "must not be negative".into(),
            });
        }

        let horizon_hours: i64 = parse_or(&get, "FORECAST_HORIZON_HOURS", DEFAULT_HORIZON_HOURS)?;
        let forecast_horizon = chrono::Duration::try_hours(horizon_hours)
            .filter(|h| *h > chrono::Duration::zero())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "FORECAST_HORIZON_HOURS",
                reason: format!("{horizon_hours} hours is not a usable horizon"),
            })?;
        let test_mode = parse_bool(&get, "TEST_MODE")?;
        let send_intro = parse_bool(&get, "SEND_INTRO_TOOT")?;
        let dispatch_queue_capacity: usize = parse_or(&get, "DISPATCH_QUEUE_CAPACITY", 16)?;

        let mastodon_server = get("MASTODON_SERVER").filter(|v| !v.is_empty());
        if mastodon_server.is_none() && !test_mode {
            return Err(ConfigError::MissingServer);
        }

        Ok(Self {
            aemo_host,
            poll_interval: Duration::from_secs(poll_secs),
            thresholds,
            forecast_horizon,
            zones: parse_zones(&get)?,
            mastodon_server,
            credentials: parse_credentials(&get)?,
            test_mode,
            send_intro,
            dispatch_queue_capacity: dispatch_queue_capacity.max(1),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// Like `parse_or`, but NaN and infinities are rejected.
fn parse_price<F>(get: &F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let price: f64 = parse_or(get, key, default)?;
    if !price.is_finite() {
        return Err(ConfigError::InvalidValue {
            key,
            reason: format!("{price} is not a finite price"),
        });
    }
    Ok(price)
}

fn parse_bool<F>(get: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(ConfigError::InvalidValue {
            key,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

/// Reads `GRIDBOT_CREDENTIALS`, falling back to the single-region
/// `MASTODON_*` variables for Queensland when it is absent or empty.
fn parse_credentials<F>(get: &F) -> Result<Vec<RegionCredentials>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let entries: Vec<CredentialEntry> = match get("GRIDBOT_CREDENTIALS") {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
        _ => Vec::new(),
    };

    if entries.is_empty() {
        tracing::info!("falling back to single-region credential variables");
        return Ok(vec![RegionCredentials {
            region: RegionId::Qld1,
            client_id: get("MASTODON_CLIENT_ID").unwrap_or_default(),
            client_secret: get("MASTODON_CLIENT_SECRET").unwrap_or_default(),
            user_email: get("MASTODON_USER_EMAIL").unwrap_or_default(),
            user_password: get("MASTODON_USER_PASSWORD").unwrap_or_default(),
        }]);
    }

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .map(|e| {
            let region: RegionId = e
                .region_id
                .parse()
                .map_err(|_| ConfigError::UnknownRegion(e.region_id.clone()))?;
            if !seen.insert(region) {
                return Err(ConfigError::DuplicateRegion(e.region_id));
            }
            Ok(RegionCredentials {
                region,
                client_id: e.client_id,
                client_secret: e.client_secret,
                user_email: e.user_email,
                user_password: e.user_password,
            })
        })
        .collect()
}

/// `MARKET_UTC_OFFSET_MINUTES` sets the uniform offset, `REGION_UTC_OFFSETS`
/// (JSON object of region -> minutes) overrides individual regions.
fn parse_zones<F>(get: &F) -> Result<ZoneTable, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_minutes: i32 = parse_or(get, "MARKET_UTC_OFFSET_MINUTES", 600)?;
    let mut zones = ZoneTable::uniform(offset("MARKET_UTC_OFFSET_MINUTES", default_minutes)?);

    if let Some(raw) = get("REGION_UTC_OFFSETS").filter(|v| !v.trim().is_empty()) {
        let overrides: HashMap<String, i32> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                key: "REGION_UTC_OFFSETS",
                reason: e.to_string(),
            })?;
        for (region, minutes) in overrides {
            let region: RegionId = region
                .parse()
                .map_err(|_| ConfigError::UnknownRegion(region.clone()))?;
            zones = zones.with_override(region, offset("REGION_UTC_OFFSETS", minutes)?);
        }
    }

    Ok(zones)
}

fn offset(key: &'static str, minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            reason: format!("offset of {minutes} minutes is out of range"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_in_test_mode() {
        let cfg = AppConfig::from_lookup(lookup(&[("TEST_MODE", "true")])).unwrap();

        assert_eq!(cfg.aemo_host, "https://aemo.com.au");
        assert_eq!(cfg.poll_interval, Duration::from_secs(300));
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert_eq!(cfg.forecast_horizon, chrono::Duration::hours(8));
        assert!(cfg.test_mode);
        assert!(!cfg.send_intro);
        assert_eq!(cfg.credentials.len(), 1);
        assert_eq!(cfg.credentials[0].region, RegionId::Qld1);
        assert_eq!(cfg.zones.offset_for(RegionId::Vic1).local_minus_utc(), 36_000);
    }

    #[test]
    fn server_required_outside_test_mode() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingServer));
    }

    #[test]
    fn thresholds_are_configurable() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "1"),
            ("INTERESTING_PEAK_RRP", "300"),
            ("UNINTERESTING_DELTA_RRP", "25.5"),
        ]))
        .unwrap();

        assert_eq!(cfg.thresholds.interesting_price, 300.0);
        assert_eq!(cfg.thresholds.uninteresting_delta, 25.5);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "true"),
            ("INTERESTING_PEAK_RRP", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "INTERESTING_PEAK_RRP",
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_finite_thresholds() {
        for (key, value) in [
            ("INTERESTING_PEAK_RRP", "NaN"),
            ("INTERESTING_PEAK_RRP", "inf"),
            ("UNINTERESTING_DELTA_RRP", "-inf"),
            ("UNINTERESTING_DELTA_RRP", "nan"),
        ] {
            let err = AppConfig::from_lookup(lookup(&[("TEST_MODE", "true"), (key, value)]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key),
                "{key}={value}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_negative_delta() {
        let err = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "true"),
            ("UNINTERESTING_DELTA_RRP", "-5"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "UNINTERESTING_DELTA_RRP",
                ..
            }
        ));
    }

    #[test]
    fn parses_multi_region_credentials() {
        let creds = r#"[
            {
                "RegionID": "QLD1",
                "MastodonClientID": "qldclientid",
                "MastodonClientSecret": "qldclientsecret",
                "MastodonUserEmail": "qlduseremail",
                "MastodonUserPassword": "qlduserpassword"
            },
            {
                "RegionID": "NSW1",
                "MastodonClientID": "nswclientid",
                "MastodonClientSecret": "nswclientsecret",
                "MastodonUserEmail": "nswuseremail",
                "MastodonUserPassword": "nswuserpassword"
            }
        ]"#;
        let cfg = AppConfig::from_lookup(lookup(&[
            ("MASTODON_SERVER", "https://mastodon.example.com"),
            ("GRIDBOT_CREDENTIALS", creds),
        ]))
        .unwrap();

        assert_eq!(cfg.mastodon_server.as_deref(), Some("https://mastodon.example.com"));
        assert_eq!(cfg.credentials.len(), 2);
        assert_eq!(cfg.credentials[0].region, RegionId::Qld1);
        assert_eq!(cfg.credentials[0].client_id, "qldclientid");
        assert_eq!(cfg.credentials[1].region, RegionId::Nsw1);
        assert_eq!(cfg.credentials[1].user_password, "nswuserpassword");
    }

    #[test]
    fn falls_back_to_single_region_variables() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("MASTODON_SERVER", "https://mastodon.example.com"),
            ("GRIDBOT_CREDENTIALS", "[]"),
            ("MASTODON_CLIENT_ID", "clientid"),
            ("MASTODON_USER_EMAIL", "bot@example.com"),
        ]))
        .unwrap();

        assert_eq!(
            cfg.credentials,
            vec![RegionCredentials {
                region: RegionId::Qld1,
                client_id: "clientid".into(),
                client_secret: String::new(),
                user_email: "bot@example.com".into(),
                user_password: String::new(),
            }]
        );
    }

    #[test]
    fn unknown_credential_region_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "true"),
            ("GRIDBOT_CREDENTIALS", r#"[{"RegionID": "NT1"}]"#),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRegion(ref r) if r == "NT1"));
    }

    #[test]
    fn duplicate_credential_region_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "true"),
            (
                "GRIDBOT_CREDENTIALS",
                r#"[{"RegionID": "SA1"}, {"RegionID": "SA1"}]"#,
            ),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRegion(_)));
    }

    #[test]
    fn malformed_credentials_json_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "true"),
            ("GRIDBOT_CREDENTIALS", "{not json"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Credentials(_)));
    }

    #[test]
    fn region_offsets_override_uniform_zone() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("TEST_MODE", "true"),
            ("REGION_UTC_OFFSETS", r#"{"SA1": 570}"#),
        ]))
        .unwrap();

        assert_eq!(cfg.zones.offset_for(RegionId::Sa1).local_minus_utc(), 570 * 60);
        assert_eq!(cfg.zones.offset_for(RegionId::Qld1).local_minus_utc(), 600 * 60);
    }
}
