//! Webhook notification sink
//!
//! Each notification is one HTTP POST with the JSON payload
//! `{"recipient": "...", "message": "..."}`. Delivery is attempted once.

use crate::notify::{NotificationSink, NotifyError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Sink posting notifications to a webhook URL
#[derive(Debug, Clone)]
pub struct WebhookSink {
    url: Url,
    client: Client,
}

impl WebhookSink {
    /// Creates a webhook sink
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute http(s) endpoint
    /// * `timeout` - Per-request timeout
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let url = Url::parse(url)
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook url '{}': {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook url must be http or https: {}",
                url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn build_payload(recipient: &str, message: &str) -> serde_json::Value {
        serde_json::json!({
            "recipient": recipient,
            "message": message,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let payload = Self::build_payload(recipient, message);
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Webhook accepted notification for {} ({})", recipient, status);
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
