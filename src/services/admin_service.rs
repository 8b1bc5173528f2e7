use serde::Serialize;
use sqlx::{Pool, Postgres, QueryBuilder, Row};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{
    Conversation, ConversationContext, ConversationStatus, ParticipantRole, Priority,
    CONVERSATION_COLUMNS,
};
use crate::models::message::{Message, MessageKind};

use super::conversation_service::ConversationService;
use super::message_service::{MessageService, NewMessage};

#[derive(Debug, Clone, Default)]
pub struct ConversationFilters {
    pub role: Option<ParticipantRole>,
    pub status: Option<ConversationStatus>,
    pub priority: Option<Priority>,
    pub unread_only: bool,
    /// Free-text match over participant display name and last-message preview.
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participant_name: String,
    /// Unread from the owning side's viewpoint; always a live recount.
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationPage {
    pub items: Vec<AdminConversationSummary>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSendFailure {
    pub user_id: Uuid,
    pub reason: String,
}

/// Aggregate result of a fan-out send. Partial failure is the expected
/// shape here, not an error: the caller gets counts, never a single
/// pass/fail verdict.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSendOutcome {
    pub sent: usize,
    pub failed: usize,
    pub failures: Vec<BulkSendFailure>,
}

pub struct AdminService;

impl AdminService {
    /// Filtered, paginated oversight listing. `page` is 1-based.
    pub async fn list_conversations(
        db: &Pool<Postgres>,
        filters: &ConversationFilters,
        page: i64,
        page_size: i64,
    ) -> AppResult<ConversationPage> {
        let page = page.max(1);
        let offset = (page - 1) * page_size;

        let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) AS total \
             FROM conversations c LEFT JOIN users u ON u.id = c.participant_id \
             WHERE 1=1",
        );
        Self::push_filters(&mut count_qb, filters);
        let total: i64 = count_qb.build().fetch_one(db).await?.try_get("total")?;

        let select = format!(
            "SELECT {}, COALESCE(u.display_name, '') AS participant_name, \
               (SELECT COUNT(*) FROM messages m \
                 WHERE m.conversation_id = c.id \
                   AND m.recipient_id = c.counterpart_id AND m.is_read = FALSE) AS unread_count \
             FROM conversations c LEFT JOIN users u ON u.id = c.participant_id \
             WHERE 1=1",
            CONVERSATION_COLUMNS
                .split(", ")
                .map(|col| format!("c.{col}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(select);
        Self::push_filters(&mut qb, filters);
        qb.push(" ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(db).await?;
        let items = rows
            .into_iter()
            .map(|row| {
                let participant_name: String = row.try_get("participant_name")?;
                let unread_count: i64 = row.try_get("unread_count")?;
                let conversation = sqlx::FromRow::from_row(&row)?;
                Ok(AdminConversationSummary {
                    conversation,
                    participant_name,
                    unread_count,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(ConversationPage {
            items,
            total,
            page,
            page_size,
        })
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ConversationFilters) {
        if let Some(role) = filters.role {
            qb.push(" AND c.participant_role = ").push_bind(role.as_str());
        }
        if let Some(status) = filters.status {
            qb.push(" AND c.status = ").push_bind(status.as_str());
        }
        if let Some(priority) = filters.priority {
            qb.push(" AND c.priority = ").push_bind(priority.as_str());
        }
        if filters.unread_only {
            qb.push(
                " AND EXISTS (SELECT 1 FROM messages m \
                   WHERE m.conversation_id = c.id \
                     AND m.recipient_id = c.counterpart_id AND m.is_read = FALSE)",
            );
        }
        if let Some(q) = filters.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{q}%");
            qb.push(" AND (u.display_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.last_message_preview ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    /// Arbitrary transitions allowed; the admin decides.
    pub async fn set_status(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        status: ConversationStatus,
    ) -> AppResult<Conversation> {
        let sql = format!(
            "UPDATE conversations SET status = $2, updated_at = now() \
             WHERE id = $1 RETURNING {CONVERSATION_COLUMNS}"
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(conversation_id)
            .bind(status.as_str())
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn set_priority(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        priority: Priority,
    ) -> AppResult<Conversation> {
        let sql = format!(
            "UPDATE conversations SET priority = $2, updated_at = now() \
             WHERE id = $1 RETURNING {CONVERSATION_COLUMNS}"
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(conversation_id)
            .bind(priority.as_str())
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Fan-out one message body to every target, resolving or creating the
    /// admin-context conversation per target. Each target is fault-isolated:
    /// one failure never aborts the rest. Returns the aggregate outcome plus
    /// the successfully sent messages (for event fanout by the caller).
    pub async fn bulk_send(
        db: &Pool<Postgres>,
        admin_id: Uuid,
        target_user_ids: &[Uuid],
        content: &str,
        subject: &str,
        target_role: ParticipantRole,
    ) -> (BulkSendOutcome, Vec<Message>) {
        let mut outcome = BulkSendOutcome::default();
        let mut sent_messages = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for &target in target_user_ids {
            if !seen.insert(target) {
                continue;
            }
            match Self::bulk_send_one(db, admin_id, target, content, subject, target_role).await {
                Ok(message) => {
                    outcome.sent += 1;
                    sent_messages.push(message);
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "bulk send target failed");
                    outcome.failed += 1;
                    outcome.failures.push(BulkSendFailure {
                        user_id: target,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (outcome, sent_messages)
    }

    async fn bulk_send_one(
        db: &Pool<Postgres>,
        admin_id: Uuid,
        target: Uuid,
        content: &str,
        subject: &str,
        target_role: ParticipantRole,
    ) -> AppResult<Message> {
        let (conversation_id, _created) = ConversationService::ensure_conversation(
            db,
            target,
            admin_id,
            ConversationContext::Admin,
            target_role,
            subject,
        )
        .await?;
        let conversation = ConversationService::get_conversation(db, conversation_id).await?;
        MessageService::send(
            db,
            &conversation,
            NewMessage {
                sender_id: admin_id,
                content: Some(content.to_string()),
                attachment: None,
                kind: MessageKind::Bulk,
            },
        )
        .await
    }

    /// Destructive and irreversible: removes the conversation and every
    /// message it owns. The FK cascade covers the messages; the explicit
    /// delete inside the transaction makes the count observable.
    pub async fn delete_conversation(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> AppResult<u64> {
        let mut tx = db.begin().await?;
        let messages_deleted = sqlx::query("DELETE FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let conversations_deleted = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if conversations_deleted == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound);
        }
        tx.commit().await?;
        Ok(messages_deleted)
    }
}
