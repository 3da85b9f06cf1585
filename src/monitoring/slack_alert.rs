//! Notification delivery
//!
//! Sends finished messages to a Slack channel via `chat.postMessage`.
//! Delivery is best effort: failures are returned to the caller, never retried.

use crate::config::AppConfig;
use crate::utils::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub channel: String,
    /// `false` when the sink skipped the message (disabled or no channel)
    pub delivered: bool,
    /// Raw response body, kept for logging only
    pub response: Option<String>,
}

impl DeliveryReceipt {
    pub fn skipped(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            delivered: false,
            response: None,
        }
    }
}

/// Destination for formatted messages
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, channel_id: &str, text: &str) -> Result<DeliveryReceipt, AppError>;
}

/// Slack `chat.postMessage` payload
#[derive(Debug, Serialize)]
pub struct SlackMessage<'a> {
    pub channel: &'a str,
    pub text: &'a str,
}

/// Slack 알림 서비스
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    api_url: String,
    token: String,
    client: Client,
    enabled: bool,
}

impl SlackNotifier {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            client: Client::new(),
            enabled: true,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        if config.slack_token.is_empty() {
            warn!("SLACK_TOKEN not configured, notifications disabled");
            return Self::disabled();
        }
        Self::new(config.slack_api_url.clone(), config.slack_token.clone())
    }

    /// Create a disabled notifier (for testing)
    pub fn disabled() -> Self {
        Self {
            api_url: String::new(),
            token: String::new(),
            client: Client::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.api_url.is_empty()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    #[instrument(skip(self, text), fields(channel = %channel_id))]
    async fn deliver(&self, channel_id: &str, text: &str) -> Result<DeliveryReceipt, AppError> {
        if !self.is_enabled() {
            debug!("Slack notifications disabled, skipping");
            return Ok(DeliveryReceipt::skipped(channel_id));
        }

        if channel_id.is_empty() {
            warn!("Channel id not configured, skipping message");
            return Ok(DeliveryReceipt::skipped(channel_id));
        }

        let payload = SlackMessage {
            channel: channel_id,
            text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send Slack message");
                AppError::delivery(format!("Failed to send Slack message: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %body, "Slack API returned error");
            return Err(AppError::delivery(format!(
                "Slack API error: {} - {}",
                status, body
            )));
        }

        info!(response = %body, "Slack message sent");
        Ok(DeliveryReceipt {
            channel: channel_id.to_string(),
            delivered: true,
            response: Some(body),
        })
    }
}

/// Writes messages to stdout instead of delivering them (`--dry-run`)
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn deliver(&self, channel_id: &str, text: &str) -> Result<DeliveryReceipt, AppError> {
        println!("[{}]\n{}\n", channel_id, text);
        Ok(DeliveryReceipt {
            channel: channel_id.to_string(),
            delivered: true,
            response: None,
        })
    }
}
