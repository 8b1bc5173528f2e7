use sqlx::{Pool, Postgres, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::Conversation;
use crate::models::message::{Attachment, Message, MessageKind, MESSAGE_COLUMNS};

use super::conversation_service::ConversationService;

/// Validated input for a single send. Built once at the boundary; the
/// service trusts it apart from the content/attachment presence check.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
    pub kind: MessageKind,
}

pub struct MessageService;

impl MessageService {
    /// Insert a message into the conversation and refresh the denormalized
    /// preview. The recipient is always the other party of the thread; the
    /// sender must be one of the two.
    pub async fn send(
        db: &Pool<Postgres>,
        conversation: &Conversation,
        new: NewMessage,
    ) -> AppResult<Message> {
        let content = new
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned);
        if content.is_none() && new.attachment.is_none() {
            return Err(AppError::BadRequest(
                "message needs text content or an attachment".into(),
            ));
        }
        let recipient_id = conversation
            .other_party(new.sender_id)
            .ok_or(AppError::Forbidden)?;

        let id = Uuid::new_v4();
        let (key, name, size, mime_class) = match &new.attachment {
            Some(a) => (
                Some(a.key.as_str()),
                Some(a.name.as_str()),
                Some(a.size),
                Some(a.mime_class.as_str()),
            ),
            None => (None, None, None, None),
        };

        let sql = format!(
            "INSERT INTO messages \
               (id, conversation_id, sender_id, recipient_id, content, kind, \
                attachment_key, attachment_name, attachment_size, attachment_mime_class) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .bind(conversation.id)
            .bind(new.sender_id)
            .bind(recipient_id)
            .bind(&content)
            .bind(new.kind.as_str())
            .bind(key)
            .bind(name)
            .bind(size)
            .bind(mime_class)
            .fetch_one(db)
            .await?;

        // Preview staleness is an accepted degraded state, not a send failure.
        let preview = content.as_deref().unwrap_or("[attachment]");
        if let Err(e) =
            ConversationService::touch_conversation(db, conversation.id, preview, message.created_at)
                .await
        {
            warn!(conversation_id = %conversation.id, error = %e, "failed to refresh conversation preview");
        }

        Ok(message)
    }

    pub async fn get_message(db: &Pool<Postgres>, message_id: Uuid) -> AppResult<Message> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Messages in presentation order: ascending creation time, ties broken
    /// by the store-assigned sequence, never by a client clock.
    pub async fn history(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY created_at ASC, seq ASC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .bind(limit.min(500))
            .bind(offset)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    /// Stamp `delivered_at` if unset. Idempotent; delivery tracking is
    /// advisory and a message may go straight to read.
    pub async fn mark_delivered(db: &Pool<Postgres>, message_id: Uuid) -> AppResult<()> {
        let affected = sqlx::query(
            "UPDATE messages SET delivered_at = now() \
             WHERE id = $1 AND delivered_at IS NULL",
        )
        .bind(message_id)
        .execute(db)
        .await?
        .rows_affected();
        if affected == 0 {
            // Either already delivered (fine) or the row is gone.
            let exists = sqlx::query("SELECT 1 FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(db)
                .await?;
            if exists.is_none() {
                return Err(AppError::NotFound);
            }
        }
        Ok(())
    }

    /// Opportunistic delivery stamping when a viewer fetches a conversation.
    pub async fn mark_delivered_for_viewer(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE messages SET delivered_at = now() \
             WHERE conversation_id = $1 AND recipient_id = $2 AND delivered_at IS NULL",
        )
        .bind(conversation_id)
        .bind(viewer)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Bulk-mark every unread message addressed to the viewer. One UPDATE:
    /// the statement's snapshot is the read snapshot, so a message inserted
    /// concurrently stays unread, which is correct (it is a new unread
    /// message). Returns the number of messages flipped.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> AppResult<u64> {
        let affected = sqlx::query(
            "UPDATE messages SET is_read = TRUE, read_at = now() \
             WHERE conversation_id = $1 AND recipient_id = $2 AND is_read = FALSE",
        )
        .bind(conversation_id)
        .bind(viewer)
        .execute(db)
        .await?
        .rows_affected();
        Ok(affected)
    }

    /// Live recount; the unread counter is a view over the messages table,
    /// never a stored number that can drift.
    pub async fn unread_count(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE conversation_id = $1 AND recipient_id = $2 AND is_read = FALSE",
        )
        .bind(conversation_id)
        .bind(viewer)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    /// Overwrite content and stamp `edited_at`. Only the original sender may
    /// edit; the previous content is not retained.
    pub async fn edit(
        db: &Pool<Postgres>,
        message_id: Uuid,
        editor: Uuid,
        new_content: &str,
    ) -> AppResult<Message> {
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Err(AppError::BadRequest("edited content cannot be empty".into()));
        }

        let message = Self::get_message(db, message_id).await?;
        if message.sender_id != editor {
            return Err(AppError::Forbidden);
        }

        let sql = format!(
            "UPDATE messages SET content = $2, edited_at = now() \
             WHERE id = $1 \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .bind(new_content)
            .fetch_one(db)
            .await?;
        Ok(updated)
    }

    /// Hard-delete a single message. Sender only.
    pub async fn delete(db: &Pool<Postgres>, message_id: Uuid, caller: Uuid) -> AppResult<Message> {
        let message = Self::get_message(db, message_id).await?;
        if message.sender_id != caller {
            return Err(AppError::Forbidden);
        }
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(db)
            .await?;
        Ok(message)
    }

    /// Conversation owning the message that references an attachment key, if
    /// any. Used to authorize signed-URL issuance.
    pub async fn conversation_for_attachment(
        db: &Pool<Postgres>,
        attachment_key: &str,
    ) -> AppResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT conversation_id FROM messages WHERE attachment_key = $1 LIMIT 1",
        )
        .bind(attachment_key)
        .fetch_optional(db)
        .await?;
        Ok(row.map(|r| r.get("conversation_id")))
    }
}
