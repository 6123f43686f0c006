//! Generic outbound webhook alert channel.
//!
//! Posts a small JSON body whose `text` field carries the plain text alert,
//! which is the shape accepted by Slack, Mattermost and most incoming-webhook
//! receivers.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::{NotifyEvent, Severity};
use crate::NotifyChannel;

/// Webhook alert channel.
pub struct WebhookChannel {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a webhook channel with a specific URL.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: Some(webhook_url.into()),
            client: reqwest::Client::new(),
        }
    }

    fn format_payload(event: &NotifyEvent) -> WebhookPayload {
        WebhookPayload {
            text: event.message(),
            severity: event.severity(),
            timestamp: event.timestamp().to_rfc3339(),
        }
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let webhook_url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("webhook URL not set".to_string()))?;

        let payload = Self::format_payload(event);

        debug!(channel = "webhook", text = %payload.text, "Sending alert");

        let response = self.client.post(webhook_url).json(&payload).send().await?;

        if response.status().is_success() {
            debug!(channel = "webhook", "Alert delivered");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "webhook",
                status = %status,
                body = %body,
                "Webhook request failed"
            );

            Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    text: String,
    severity: Severity,
    timestamp: String,
}
