use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::{AuthUser, ConversationParty};
use crate::models::conversation::{Conversation, ConversationContext};
use crate::models::message::{Attachment, Message, MessageKind};
use crate::services::attachment_service::AttachmentPipeline;
use crate::services::conversation_service::{ConversationService, ConversationSummary};
use crate::services::message_service::{MessageService, NewMessage};
use crate::services::notifier::{dispatch, NotificationEvent};
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, WsEvent};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(start_conversation).get(list_conversations))
        .route("/conversations/:id", get(conversation_detail))
        .route("/conversations/:id/messages", post(send_message))
        .route("/conversations/:id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub counterpart_id: Uuid,
    #[serde(default)]
    pub context: Option<ConversationContext>,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub created: bool,
}

/// Resolve-or-create the thread between the caller and a counterpart.
/// Idempotent: repeat calls return the existing row with `created: false`.
async fn start_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<StartConversationRequest>,
) -> AppResult<(StatusCode, Json<StartConversationResponse>)> {
    let context = req.context.unwrap_or(ConversationContext::Application);
    let subject = req.subject.as_deref().unwrap_or("").trim();

    let (id, created) = ConversationService::ensure_conversation(
        &state.db,
        user.id,
        req.counterpart_id,
        context,
        user.role,
        subject,
    )
    .await?;
    let conversation = ConversationService::get_conversation(&state.db, id).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(StartConversationResponse { conversation, created })))
}

async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let summaries = ConversationService::list_for_user(&state.db, user.id).await?;
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub unread_count: i64,
    pub counterpart_typing: bool,
}

/// Thread view: conversation metadata plus messages in presentation order.
/// Fetching also stamps delivery on everything addressed to the viewer.
async fn conversation_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<ConversationDetail>> {
    let party = ConversationParty::verify(&state.db, id, &user).await?;

    MessageService::mark_delivered_for_viewer(&state.db, id, user.id).await?;

    let limit = query
        .limit
        .unwrap_or(state.config.max_page_size)
        .clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);
    let messages = MessageService::history(&state.db, id, limit, offset).await?;
    let unread_count = MessageService::unread_count(&state.db, id, user.id).await?;
    let counterpart_typing = state.typing.is_counterpart_typing(id, user.id);

    Ok(Json(ConversationDetail {
        conversation: party.conversation,
        messages,
        unread_count,
        counterpart_typing,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
    /// Metadata returned by the upload endpoint; the key must sit under the
    /// sender's namespace.
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let party = ConversationParty::verify(&state.db, id, &user).await?;
    if !party.conversation.is_party(user.id) {
        // Admins can read any thread but only write into their own.
        return Err(AppError::Forbidden);
    }
    if let Some(attachment) = &req.attachment {
        if !AttachmentPipeline::is_owned_by(&attachment.key, user.id) {
            return Err(AppError::Forbidden);
        }
    }

    let message = MessageService::send(
        &state.db,
        &party.conversation,
        NewMessage {
            sender_id: user.id,
            content: req.content,
            attachment: req.attachment,
            kind: MessageKind::Text,
        },
    )
    .await?;

    // Sending supersedes any live typing signal from the sender.
    state.typing.signal_stopped(id, user.id);

    broadcast_event(
        &state.registry,
        &state.redis,
        id,
        WsEvent::MessageNew {
            message_id: message.id,
            sender_id: user.id,
            seq: message.seq,
        },
    )
    .await;

    let preview = message.content.clone().unwrap_or_else(|| "[attachment]".into());
    dispatch(
        state.notifier.clone(),
        NotificationEvent::MessageReceived {
            recipient_id: message.recipient_id,
            conversation_id: id,
            message_id: message.id,
            preview,
        },
    );

    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked_read: u64,
    pub unread_count: i64,
}

/// Bulk-mark everything addressed to the caller as read.
async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MarkReadResponse>> {
    ConversationParty::verify(&state.db, id, &user).await?;

    let marked_read = MessageService::mark_read(&state.db, id, user.id).await?;
    if marked_read > 0 {
        broadcast_event(
            &state.registry,
            &state.redis,
            id,
            WsEvent::ConversationRead { reader_id: user.id },
        )
        .await;
    }
    let unread_count = MessageService::unread_count(&state.db, id, user.id).await?;

    Ok(Json(MarkReadResponse {
        marked_read,
        unread_count,
    }))
}
