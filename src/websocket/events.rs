//! Real-time conversation events.
//!
//! Every event serializes to one flat JSON object:
//! ```json
//! {
//!     "type": "message.new",
//!     "timestamp": "2026-08-30T10:30:00Z",
//!     "conversation_id": "uuid",
//!     ...event fields
//! }
//! ```
//! Serialization is centralized here; handlers never build payloads by hand.
//! Delivery is best-effort: fanout failures are logged, never surfaced.

use axum::extract::ws::Message;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::models::conversation::{ConversationStatus, Priority};
use crate::websocket::{pubsub, ConnectionRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WsEvent {
    #[serde(rename = "message.new")]
    MessageNew {
        message_id: Uuid,
        sender_id: Uuid,
        seq: i64,
    },

    #[serde(rename = "message.edited")]
    MessageEdited { message_id: Uuid },

    #[serde(rename = "message.deleted")]
    MessageDeleted { message_id: Uuid },

    /// The viewer bulk-marked the conversation read.
    #[serde(rename = "conversation.read")]
    ConversationRead { reader_id: Uuid },

    #[serde(rename = "typing.started")]
    TypingStarted { user_id: Uuid },

    #[serde(rename = "typing.stopped")]
    TypingStopped { user_id: Uuid },

    /// Admin changed status/priority metadata.
    #[serde(rename = "conversation.updated")]
    ConversationUpdated {
        status: ConversationStatus,
        priority: Priority,
    },
}

impl WsEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::MessageEdited { .. } => "message.edited",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::ConversationRead { .. } => "conversation.read",
            Self::TypingStarted { .. } => "typing.started",
            Self::TypingStopped { .. } => "typing.stopped",
            Self::ConversationUpdated { .. } => "conversation.updated",
        }
    }

    /// Flat payload: common envelope fields plus the variant's own fields.
    pub fn to_payload_value(
        &self,
        conversation_id: Uuid,
    ) -> Result<serde_json::Value, serde_json::Error> {
        let mut payload = serde_json::json!({
            "type": self.event_type(),
            "timestamp": Utc::now().to_rfc3339(),
            "conversation_id": conversation_id,
        });

        // Externally tagged enum: unwrap the single-entry map, then flatten.
        let data = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map
                .into_iter()
                .next()
                .map(|(_, inner)| inner)
                .unwrap_or(serde_json::Value::Null),
            other => other,
        };
        if let serde_json::Value::Object(fields) = data {
            for (key, value) in fields {
                payload[key] = value;
            }
        }

        Ok(payload)
    }

    pub fn to_broadcast_payload(
        &self,
        conversation_id: Uuid,
    ) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_payload_value(conversation_id)?)
    }
}

/// Canonical fanout: local registry plus Redis pub/sub for other instances.
/// Best-effort on both legs; a dropped event means an indicator is briefly
/// stale, never lost state.
pub async fn broadcast_event(
    registry: &ConnectionRegistry,
    redis: &redis::Client,
    conversation_id: Uuid,
    event: WsEvent,
) {
    let payload = match event.to_broadcast_payload(conversation_id) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, event = event.event_type(), "failed to serialize ws event");
            return;
        }
    };
    registry
        .broadcast(conversation_id, Message::Text(payload.clone()))
        .await;
    if let Err(e) = pubsub::publish(redis, conversation_id, &payload).await {
        warn!(error = %e, event = event.event_type(), "redis publish failed");
    }
}
