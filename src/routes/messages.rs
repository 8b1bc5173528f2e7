use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::guards::AuthUser;
use crate::models::message::Message;
use crate::services::message_service::MessageService;
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, WsEvent};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages/:id/delivered", post(mark_delivered))
        .route("/messages/:id", put(edit_message).delete(delete_message))
}

/// Advisory delivery receipt from the recipient's client. Idempotent.
async fn mark_delivered(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let message = MessageService::get_message(&state.db, id).await?;
    if message.recipient_id != user.id {
        return Err(AppError::Forbidden);
    }
    MessageService::mark_delivered(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

async fn edit_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<EditMessageRequest>,
) -> AppResult<Json<Message>> {
    let updated = MessageService::edit(&state.db, id, user.id, &req.content).await?;
    broadcast_event(
        &state.registry,
        &state.redis,
        updated.conversation_id,
        WsEvent::MessageEdited { message_id: id },
    )
    .await;
    Ok(Json(updated))
}

async fn delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let deleted = MessageService::delete(&state.db, id, user.id).await?;
    broadcast_event(
        &state.registry,
        &state.redis,
        deleted.conversation_id,
        WsEvent::MessageDeleted { message_id: id },
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
