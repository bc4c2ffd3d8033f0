use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use corelib::models::RawInterval;

use crate::aemo::errors::AemoError;
use crate::aemo::types::{ReportEnvelope, ReportRequest};

pub const REPORT_PATH: &str = "/aemo/apps/api/report/5MIN";

#[derive(Clone)]
pub struct AemoClient {
    http: Client,
    host: String,
}

impl AemoClient {
    pub fn new(host: String) -> Result<Self, AemoError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches the current 5-minute price and demand report for all regions.
    ///
    /// Gzip-encoded responses are decoded transparently.
    #[instrument(skip(self), fields(host = %self.host), level = "debug")]
    pub async fn fetch_report(&self) -> Result<Vec<RawInterval>, AemoError> {
        let url = format!("{}{}", self.host, REPORT_PATH);

        let resp = self
            .http
            .post(&url)
            .json(&ReportRequest::default())
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(AemoError::Status(resp.status().as_u16()));
        }

        let envelope: ReportEnvelope = resp.json().await?;
        let intervals = decode_records(envelope.intervals);

        debug!(intervals = intervals.len(), "aemo report fetched");

        Ok(intervals)
    }
}

/// Decodes each record on its own; undecodable ones are logged and skipped.
fn decode_records(records: Vec<serde_json::Value>) -> Vec<RawInterval> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(index, error = %e, "dropping undecodable aemo record");
                None
            }
        })
        .collect()
}
