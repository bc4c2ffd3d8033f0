use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::config::RegionCredentials;
use crate::mastodon::errors::PublishError;
use crate::mastodon::types::{AccessToken, PostedStatus, StatusRequest};

const OAUTH_SCOPE: &str = "read write";

#[derive(Clone)]
pub struct MastodonClient {
    http: Client,
    server: String,
}

impl MastodonClient {
    pub fn new(server: String) -> Result<Self, PublishError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    /// Password-grant login for the region's bot account.
    #[instrument(
        skip(self, creds),
        fields(region = %creds.region),
        level = "debug"
    )]
    pub async fn authenticate(
        &self,
        creds: &RegionCredentials,
    ) -> Result<AccessToken, PublishError> {
        let url = format!("{}/oauth/token", self.server);

        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
                ("username", creds.user_email.as_str()),
                ("password", creds.user_password.as_str()),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PublishError::AuthRejected(resp.status().as_u16()));
        }

        let token: AccessToken = resp.json().await?;
        debug!(token_type = %token.token_type, "mastodon session established");

        Ok(token)
    }

    /// Posts a status. Any 2xx counts as posted; the returned status is
    /// `None` when the body could not be read.
    #[instrument(skip(self, token, status), level = "debug")]
    pub async fn post_status(
        &self,
        token: &AccessToken,
        status: &str,
    ) -> Result<Option<PostedStatus>, PublishError> {
        let url = format!("{}/api/v1/statuses", self.server);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token.access_token)
            .json(&StatusRequest { status })
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => match resp.json::<PostedStatus>().await {
                Ok(posted) => {
                    debug!(status_id = %posted.id, "status posted");
                    Ok(Some(posted))
                }
                Err(e) => {
                    debug!(error = %e, "status posted; response body not understood");
                    Ok(None)
                }
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PublishError::AuthRejected(resp.status().as_u16()))
            }
            s => Err(PublishError::StatusRejected(s.as_u16())),
        }
    }
}
