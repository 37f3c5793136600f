use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::message::render_text;
use crate::{NotificationError, Notifier, TransitionNotification};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Posts transition notifications to a Slack-style incoming webhook.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: SecretString,
    retry: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(
        webhook_url: SecretString,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|error| NotificationError::Transport(error.to_string()))?;

        Ok(Self { client, webhook_url, retry })
    }

    async fn post_once(
        &self,
        notification: &TransitionNotification,
    ) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&json!({ "text": render_text(notification) }))
            .send()
            .await
            .map_err(|error| NotificationError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected { status: response.status().as_u16() });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        notification: &TransitionNotification,
    ) -> Result<(), NotificationError> {
        let mut attempt = 0;
        loop {
            match self.post_once(notification).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    debug!(
                        event_name = "notify.webhook.retry",
                        request_id = %notification.request_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "webhook delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
