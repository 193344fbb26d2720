//! Notification delivery for war-start reminders
//!
//! A sink delivers one message to one recipient. `notify` fans a message out
//! to a recipient list; a failed recipient is logged and never aborts the
//! batch.

mod webhook;

pub use webhook::WebhookSink;

use crate::config::NotifyConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected notification: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Something that can deliver a message to a recipient
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Delivers `message` to `recipient`
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

/// Sink that only writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!("Notify {}: {}", recipient, message);
        Ok(())
    }
}

/// Sends `message` to every recipient
///
/// # Returns
///
/// The number of recipients that were reached
pub async fn notify(sink: &dyn NotificationSink, recipients: &[String], message: &str) -> usize {
    let mut delivered = 0;

    for recipient in recipients {
        match sink.send(recipient, message).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::warn!(
                "Failed to notify {} via {}: {}",
                recipient,
                sink.name(),
                e
            ),
        }
    }

    tracing::debug!(
        "Delivered notification to {}/{} recipients via {}",
        delivered,
        recipients.len(),
        sink.name()
    );
    delivered
}

/// Builds the sink described by the `[notify]` section
///
/// A configured webhook URL selects `WebhookSink`; otherwise notifications are
/// only logged.
pub fn build_sink(
    config: &NotifyConfig,
    timeout: Duration,
) -> Result<Arc<dyn NotificationSink>, NotifyError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookSink::new(url, timeout)?)),
        None => Ok(Arc::new(LogSink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails for one recipient and records the rest
    struct FlakySink {
        fail_for: String,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn send(&self, recipient: &str, _message: &str) -> Result<(), NotifyError> {
            if recipient == self.fail_for {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            self.sent.lock().unwrap().push(recipient.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let sink = FlakySink {
            fail_for: "bob".to_string(),
            sent: Mutex::new(Vec::new()),
        };
        let recipients = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];

        let delivered = notify(&sink, &recipients, "war starts soon").await;

        assert_eq!(delivered, 2);
        assert_eq!(*sink.sent.lock().unwrap(), vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_log_sink_always_delivers() {
        let recipients = vec!["alice".to_string()];
        assert_eq!(notify(&LogSink, &recipients, "hello").await, 1);
        assert_eq!(notify(&LogSink, &[], "hello").await, 0);
    }

    #[test]
    fn test_build_sink_selects_backend() {
        let sink = build_sink(&NotifyConfig::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(sink.name(), "log");

        let config = NotifyConfig {
            webhook_url: Some("https://hooks.example.com/war".to_string()),
        };
        let sink = build_sink(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(sink.name(), "webhook");
    }
}
