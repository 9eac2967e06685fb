//! HTTP client for the two player endpoints.
//!
//! The player only ever reads its own display and posts heartbeats; every
//! other API route belongs to the dashboard.

use crate::error::PlayerError;
use crate::model::{Display, DisplayEnvelope, ErrorBody};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Where the player loop gets its display from.
///
/// Implemented by [`ApiClient`]; tests substitute scripted sources.
#[async_trait]
pub trait DisplaySource: Send + Sync {
    /// Fetch the display bound to `device_key`.
    async fn fetch_display(&self, device_key: &str) -> Result<Display, PlayerError>;

    /// Report that the device is alive. Callers ignore the outcome.
    async fn heartbeat(&self, device_key: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatRequest<'a> {
    device_key: &'a str,
}

/// reqwest-backed client for the signage API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    api_url: String,
}

impl ApiClient {
    /// Build a client whose requests all time out after `timeout`.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn player_url(&self, device_key: &str) -> String {
        format!(
            "{}/api/displays/player/{}",
            self.api_url,
            urlencoding::encode(device_key)
        )
    }

    fn heartbeat_url(&self) -> String {
        format!("{}/api/displays/heartbeat", self.api_url)
    }
}

#[async_trait]
impl DisplaySource for ApiClient {
    async fn fetch_display(&self, device_key: &str) -> Result<Display, PlayerError> {
        let url = self.player_url(device_key);
        tracing::debug!("Fetching display from {}", url);

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PlayerError::Unreachable(e.to_string()))?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PlayerError::NotFound {
                device_key: device_key.to_string(),
            });
        }

        if !status.is_success() {
            let body: ErrorBody = res.json().await.unwrap_or_default();
            let message = body.error.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
            return Err(PlayerError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = res.bytes().await.map_err(|e| {
            if e.is_timeout() {
                PlayerError::Unreachable(e.to_string())
            } else {
                PlayerError::Malformed(e.to_string())
            }
        })?;
        let envelope: DisplayEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| PlayerError::Malformed(e.to_string()))?;
        envelope.display.validate()?;

        Ok(envelope.display)
    }

    async fn heartbeat(&self, device_key: &str) -> Result<()> {
        self.client
            .post(self.heartbeat_url())
            .json(&HeartbeatRequest { device_key })
            .send()
            .await
            .context("Heartbeat request failed")?;
        Ok(())
    }
}
