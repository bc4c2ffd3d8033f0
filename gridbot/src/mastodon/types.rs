use serde::{Deserialize, Serialize};

/// Bearer token returned by the password grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct StatusRequest<'a> {
    pub status: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PostedStatus {
    pub id: String,
}
