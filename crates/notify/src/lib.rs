//! Outbound notifications for request lifecycle changes.
//!
//! The orchestration layer reports committed transitions through the
//! [`Notifier`] trait:
//! - **Webhook** (`webhook`) - posts to a Slack-style incoming webhook
//! - **Message rendering** (`message`) - plain-text payload construction
//!
//! Delivery is best-effort by contract: a failed send is returned as a
//! [`NotificationError`] for the caller to log, never to roll back the
//! already-committed state change.

pub mod message;
pub mod webhook;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use procflow_core::domain::request::RequestStatus;

pub use webhook::{RetryPolicy, WebhookNotifier};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("webhook responded with status {status}")]
    Rejected { status: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionNotification {
    pub request_id: String,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub actor_uid: String,
    pub vendor: String,
    pub total_estimate: Decimal,
    pub warnings: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &TransitionNotification)
        -> Result<(), NotificationError>;
}

/// Stands in when notifications are disabled; also handy in tests.
#[derive(Clone, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _notification: &TransitionNotification,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use procflow_core::domain::request::RequestStatus;

    use super::{NoopNotifier, Notifier, TransitionNotification};

    #[tokio::test]
    async fn noop_notifier_always_succeeds() {
        let notification = TransitionNotification {
            request_id: "REQ-1".to_string(),
            from: RequestStatus::Draft,
            to: RequestStatus::Submitted,
            actor_uid: "u-req".to_string(),
            vendor: "Office Depot".to_string(),
            total_estimate: Decimal::new(45_000, 2),
            warnings: vec![],
        };

        NoopNotifier.notify(&notification).await.expect("noop never fails");
    }
}
