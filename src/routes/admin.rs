use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::AdminUser;
use crate::models::conversation::{
    Conversation, ConversationStatus, ParticipantRole, Priority,
};
use crate::services::admin_service::{
    AdminService, BulkSendOutcome, ConversationFilters, ConversationPage,
};
use crate::services::notifier::{dispatch, NotificationEvent};
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, WsEvent};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/conversations", get(list_conversations))
        .route("/admin/conversations/:id/status", put(set_status))
        .route("/admin/conversations/:id/priority", put(set_priority))
        .route("/admin/conversations/:id", delete(delete_conversation))
        .route("/admin/messages/bulk", post(bulk_send))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub role: Option<ParticipantRole>,
    #[serde(default)]
    pub status: Option<ConversationStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub unread: Option<bool>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

async fn list_conversations(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListConversationsQuery>,
) -> AppResult<Json<ConversationPage>> {
    let filters = ConversationFilters {
        role: query.role,
        status: query.status,
        priority: query.priority,
        unread_only: query.unread.unwrap_or(false),
        q: query.q,
    };
    let page = query.page.unwrap_or(1);
    let page_size = query
        .page_size
        .unwrap_or(state.config.default_page_size)
        .clamp(1, state.config.max_page_size);

    let result = AdminService::list_conversations(&state.db, &filters, page, page_size).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: ConversationStatus,
}

async fn set_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<Json<Conversation>> {
    let conversation = AdminService::set_status(&state.db, id, req.status).await?;

    broadcast_event(
        &state.registry,
        &state.redis,
        id,
        WsEvent::ConversationUpdated {
            status: conversation.status,
            priority: conversation.priority,
        },
    )
    .await;
    dispatch(
        state.notifier.clone(),
        NotificationEvent::ConversationStatusChanged {
            recipient_id: conversation.participant_id,
            conversation_id: id,
            status: conversation.status,
        },
    );

    Ok(Json(conversation))
}

#[derive(Debug, Deserialize)]
pub struct SetPriorityRequest {
    pub priority: Priority,
}

async fn set_priority(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SetPriorityRequest>,
) -> AppResult<Json<Conversation>> {
    let conversation = AdminService::set_priority(&state.db, id, req.priority).await?;

    broadcast_event(
        &state.registry,
        &state.redis,
        id,
        WsEvent::ConversationUpdated {
            status: conversation.status,
            priority: conversation.priority,
        },
    )
    .await;

    Ok(Json(conversation))
}

#[derive(Debug, Deserialize)]
pub struct BulkSendRequest {
    pub target_user_ids: Vec<Uuid>,
    pub content: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub target_role: Option<ParticipantRole>,
}

/// Fan-out one message to many users. Individual target failures never
/// abort the batch; partial success returns the outcome breakdown. Only a
/// batch where every target failed escalates to an error.
async fn bulk_send(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(req): Json<BulkSendRequest>,
) -> AppResult<Json<BulkSendOutcome>> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("bulk message content is empty".into()));
    }
    if req.target_user_ids.is_empty() {
        return Err(AppError::BadRequest("no bulk targets given".into()));
    }
    let subject = req.subject.as_deref().unwrap_or("").trim();
    let target_role = req.target_role.unwrap_or(ParticipantRole::Talent);

    let (outcome, sent_messages) = AdminService::bulk_send(
        &state.db,
        admin.id,
        &req.target_user_ids,
        content,
        subject,
        target_role,
    )
    .await;

    if outcome.sent == 0 {
        let reasons = outcome
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.user_id, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::BadRequest(format!(
            "all bulk targets failed: {reasons}"
        )));
    }

    for message in sent_messages {
        broadcast_event(
            &state.registry,
            &state.redis,
            message.conversation_id,
            WsEvent::MessageNew {
                message_id: message.id,
                sender_id: admin.id,
                seq: message.seq,
            },
        )
        .await;
        dispatch(
            state.notifier.clone(),
            NotificationEvent::MessageReceived {
                recipient_id: message.recipient_id,
                conversation_id: message.conversation_id,
                message_id: message.id,
                preview: message.content.unwrap_or_default(),
            },
        );
    }

    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct DeleteConversationResponse {
    pub messages_deleted: u64,
}

async fn delete_conversation(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteConversationResponse>> {
    let messages_deleted = AdminService::delete_conversation(&state.db, id).await?;
    Ok(Json(DeleteConversationResponse { messages_deleted }))
}
