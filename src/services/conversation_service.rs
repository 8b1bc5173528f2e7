use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{
    Conversation, ConversationContext, ParticipantRole, CONVERSATION_COLUMNS,
};

/// Denormalized previews are truncated to this many characters.
const PREVIEW_MAX_CHARS: usize = 140;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub unread_count: i64,
}

pub struct ConversationService;

impl ConversationService {
    /// Resolve-or-create the conversation for an ordered (participant,
    /// counterpart) pair in a context. Returns the id and whether a new row
    /// was created. Defaults: status active, priority medium, empty tags.
    ///
    /// Concurrent callers race on the unique (pair, context) index; the
    /// loser's insert is a no-op and the follow-up select wins either way.
    pub async fn ensure_conversation(
        db: &Pool<Postgres>,
        participant_id: Uuid,
        counterpart_id: Uuid,
        context: ConversationContext,
        participant_role: ParticipantRole,
        subject: &str,
    ) -> AppResult<(Uuid, bool)> {
        if participant_id == counterpart_id {
            return Err(AppError::BadRequest(
                "conversation requires two distinct parties".into(),
            ));
        }

        if let Some(id) = Self::find_pair(db, participant_id, counterpart_id, context).await? {
            return Ok((id, false));
        }

        let id = Uuid::new_v4();
        let inserted = sqlx::query(
            "INSERT INTO conversations \
               (id, participant_id, counterpart_id, participant_role, context, subject) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (participant_id, counterpart_id, context) DO NOTHING",
        )
        .bind(id)
        .bind(participant_id)
        .bind(counterpart_id)
        .bind(participant_role.as_str())
        .bind(context.as_str())
        .bind(subject)
        .execute(db)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok((id, true));
        }

        // Lost the race; the winner's row exists now.
        Self::find_pair(db, participant_id, counterpart_id, context)
            .await?
            .map(|id| (id, false))
            .ok_or(AppError::Internal)
    }

    async fn find_pair(
        db: &Pool<Postgres>,
        participant_id: Uuid,
        counterpart_id: Uuid,
        context: ConversationContext,
    ) -> AppResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT id FROM conversations \
             WHERE participant_id = $1 AND counterpart_id = $2 AND context = $3",
        )
        .bind(participant_id)
        .bind(counterpart_id)
        .bind(context.as_str())
        .fetch_optional(db)
        .await?;
        Ok(row.map(|r| r.get("id")))
    }

    pub async fn get_conversation(db: &Pool<Postgres>, id: Uuid) -> AppResult<Conversation> {
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1");
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Update the denormalized preview fields after a successful message
    /// insert. Fire-and-forget relative to the message write: callers log a
    /// failure and move on, the message itself is already durable.
    /// Last write wins; timestamps are server-assigned so skew is a non-issue.
    pub async fn touch_conversation(
        db: &Pool<Postgres>,
        id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let preview: String = preview.chars().take(PREVIEW_MAX_CHARS).collect();
        sqlx::query(
            "UPDATE conversations \
             SET last_message_preview = $2, last_message_at = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(preview)
        .bind(at)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Conversations the user takes part in, most recently active first,
    /// with a live unread recount per row.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS}, \
               (SELECT COUNT(*) FROM messages m \
                 WHERE m.conversation_id = conversations.id \
                   AND m.recipient_id = $1 AND m.is_read = FALSE) AS unread_count \
             FROM conversations \
             WHERE participant_id = $1 OR counterpart_id = $1 \
             ORDER BY last_message_at DESC NULLS LAST, created_at DESC \
             LIMIT 100"
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(db).await?;
        rows.into_iter()
            .map(|row| {
                let unread_count: i64 = row.try_get("unread_count")?;
                let conversation = sqlx::FromRow::from_row(&row)?;
                Ok(ConversationSummary {
                    conversation,
                    unread_count,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(AppError::from)
    }
}
