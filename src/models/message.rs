use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
    Bulk,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::System => "system",
            Self::Bulk => "bulk",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "system" => Self::System,
            "bulk" => Self::Bulk,
            _ => Self::Text,
        }
    }
}

/// Coarse classification used only to decide inline preview vs. download
/// link. The pipeline never inspects content beyond this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeClass {
    Image,
    File,
}

impl MimeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::File => "file",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "image" => Self::Image,
            _ => Self::File,
        }
    }
}

/// Embedded attachment metadata. `key` is a stable, non-expiring object
/// reference; signed URLs are computed on read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub key: String,
    pub name: String,
    pub size: i64,
    pub mime_class: MimeClass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Store-assigned monotonic sequence; breaks creation-timestamp ties.
    pub seq: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: Option<String>,
    pub kind: MessageKind,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub is_read: bool,
}

pub const MESSAGE_COLUMNS: &str = "id, seq, conversation_id, sender_id, recipient_id, content, \
     kind, attachment_key, attachment_name, attachment_size, attachment_mime_class, \
     created_at, edited_at, delivered_at, read_at, is_read";

impl<'r> FromRow<'r, PgRow> for Message {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let attachment = match row.try_get::<Option<String>, _>("attachment_key")? {
            Some(key) => {
                let mime_class: Option<String> = row.try_get("attachment_mime_class")?;
                Some(Attachment {
                    key,
                    name: row
                        .try_get::<Option<String>, _>("attachment_name")?
                        .unwrap_or_default(),
                    size: row
                        .try_get::<Option<i64>, _>("attachment_size")?
                        .unwrap_or(0),
                    mime_class: MimeClass::from_str(mime_class.as_deref().unwrap_or("file")),
                })
            }
            None => None,
        };
        Ok(Message {
            id: row.try_get("id")?,
            seq: row.try_get("seq")?,
            conversation_id: row.try_get("conversation_id")?,
            sender_id: row.try_get("sender_id")?,
            recipient_id: row.try_get("recipient_id")?,
            content: row.try_get("content")?,
            kind: MessageKind::from_str(&kind),
            attachment,
            created_at: row.try_get("created_at")?,
            edited_at: row.try_get("edited_at")?,
            delivered_at: row.try_get("delivered_at")?,
            read_at: row.try_get("read_at")?,
            is_read: row.try_get("is_read")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        for k in ["text", "system", "bulk"] {
            assert_eq!(MessageKind::from_str(k).as_str(), k);
        }
        assert_eq!(MessageKind::from_str("unknown"), MessageKind::Text);
    }

    #[test]
    fn mime_class_defaults_to_file() {
        assert_eq!(MimeClass::from_str("image"), MimeClass::Image);
        assert_eq!(MimeClass::from_str("application"), MimeClass::File);
    }
}
