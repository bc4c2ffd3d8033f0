//! Outbound status delivery.
//!
//! A publisher is owned by exactly one region dispatcher. It is handed one
//! message at a time and never retries on its own.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use corelib::models::RegionId;

use crate::config::RegionCredentials;
use crate::mastodon::client::MastodonClient;
use crate::mastodon::errors::PublishError;
use crate::mastodon::types::AccessToken;

#[async_trait]
pub trait Publisher: Send + 'static {
    async fn publish(&mut self, status: &str) -> Result<(), PublishError>;
}

/// Posts to a Mastodon account, caching the authenticated session.
///
/// Any failure drops the cached session so the next message logs in again.
pub struct MastodonPublisher {
    client: MastodonClient,
    credentials: RegionCredentials,
    session: Option<AccessToken>,
}

impl MastodonPublisher {
    pub fn new(client: MastodonClient, credentials: RegionCredentials) -> Self {
        Self {
            client,
            credentials,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn try_publish(&mut self, status: &str) -> Result<(), PublishError> {
        let token = match self.session.take() {
            Some(token) => token,
            None => self.client.authenticate(&self.credentials).await?,
        };

        self.client.post_status(&token, status).await?;
        self.session = Some(token);
        Ok(())
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    async fn publish(&mut self, status: &str) -> Result<(), PublishError> {
        let result = self.try_publish(status).await;
        if result.is_err() {
            warn!(region = %self.credentials.region, "mastodon session invalidated");
        } else {
            info!(region = %self.credentials.region, status, "tooted");
        }
        result
    }
}

/// Shared record of everything a dry-run publisher would have posted.
#[derive(Clone, Default, Debug)]
pub struct Outbox {
    inner: Arc<Mutex<Vec<(RegionId, String)>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, region: RegionId, status: &str) {
        self.inner.lock().push((region, status.to_string()));
    }

    pub fn messages(&self) -> Vec<(RegionId, String)> {
        self.inner.lock().clone()
    }

    pub fn messages_for(&self, region: RegionId) -> Vec<String> {
        self.inner
            .lock()
            .iter()
            .filter(|(r, _)| *r == region)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

/// Test-mode publisher: logs and records, never transmits.
pub struct DryRunPublisher {
    region: RegionId,
    outbox: Outbox,
}

impl DryRunPublisher {
    pub fn new(region: RegionId, outbox: Outbox) -> Self {
        Self { region, outbox }
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&mut self, status: &str) -> Result<(), PublishError> {
        info!(region = %self.region, status, "would toot");
        self.outbox.push(self.region, status);
        Ok(())
    }
}
