use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::conversation::ConversationStatus;

/// Outbound events that matter to the *other* participant. Emitted after the
/// primary write commits; a slow or failing dispatch path can never block or
/// fail that write.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    MessageReceived {
        recipient_id: Uuid,
        conversation_id: Uuid,
        message_id: Uuid,
        preview: String,
    },
    ConversationStatusChanged {
        recipient_id: Uuid,
        conversation_id: Uuid,
        status: ConversationStatus,
    },
}

#[derive(Debug, Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// Seam for push/email integrations. The core never waits on or retries
/// dispatch; failures are logged and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Default dispatcher: structured log line per event. Production deployments
/// swap in a real push/email client behind the same trait.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        match serde_json::to_string(&event) {
            Ok(payload) => {
                info!(event = %payload, "notification dispatched");
                Ok(())
            }
            Err(e) => Err(NotifyError(e.to_string())),
        }
    }
}

/// Fire-and-forget dispatch on a detached task.
pub fn dispatch(notifier: Arc<dyn Notifier>, event: NotificationEvent) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(event).await {
            warn!(error = %e, "notification dispatch failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = NotificationEvent::MessageReceived {
            recipient_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            preview: "hello".into(),
        };
        let v: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "message_received");
        assert_eq!(v["preview"], "hello");
    }

    #[tokio::test]
    async fn log_notifier_accepts_events() {
        let n = LogNotifier;
        let event = NotificationEvent::ConversationStatusChanged {
            recipient_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            status: ConversationStatus::Resolved,
        };
        assert!(n.notify(event).await.is_ok());
    }
}
