use serde::{Deserialize, Serialize};

/// Request body of the price-and-demand report.
#[derive(Debug, Serialize)]
pub struct ReportRequest {
    #[serde(rename = "timeScale")]
    pub time_scale: Vec<&'static str>,
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            time_scale: vec!["30MIN"],
        }
    }
}

/// Records are kept as raw JSON so one malformed entry cannot fail the report.
#[derive(Debug, Deserialize)]
pub struct ReportEnvelope {
    #[serde(rename = "5MIN", default)]
    pub intervals: Vec<serde_json::Value>,
}
