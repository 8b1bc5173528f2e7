use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::guards::{AuthUser, ConversationParty};
use crate::models::conversation::ParticipantRole;
use crate::models::message::Attachment;
use crate::services::attachment_service::AttachmentPipeline;
use crate::services::message_service::MessageService;
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    // The framework's body cap sits just above the pipeline's own ceiling so
    // oversize payloads get the typed 413, not a generic rejection.
    Router::new()
        .route(
            "/attachments",
            post(upload).layer(DefaultBodyLimit::max(state.config.max_file_bytes + 64 * 1024)),
        )
        .route("/attachments/access-url", get(access_url))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub file_name: String,
}

/// Raw-body upload; metadata rides in the query string and the Content-Type
/// header. Returns the stable attachment reference to embed in a send.
async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Attachment>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing content type".into()))?;

    let attachment = state
        .attachments
        .upload(user.id, &params.file_name, content_type, body)
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

#[derive(Debug, Deserialize)]
pub struct AccessUrlParams {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct AccessUrlResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}

/// Exchange a stable key for a short-lived signed URL. Allowed for parties
/// of the owning conversation, admins, and the uploader of a not-yet-sent
/// attachment.
async fn access_url(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<AccessUrlParams>,
) -> AppResult<Json<AccessUrlResponse>> {
    match MessageService::conversation_for_attachment(&state.db, &params.key).await? {
        Some(conversation_id) => {
            ConversationParty::verify(&state.db, conversation_id, &user).await?;
        }
        None => {
            let owned = AttachmentPipeline::is_owned_by(&params.key, user.id);
            if !owned && user.role != ParticipantRole::Admin {
                return Err(AppError::Forbidden);
            }
        }
    }

    let url = state.attachments.access_url(&params.key).await;
    Ok(Json(AccessUrlResponse {
        url,
        expires_in_seconds: state.config.signed_url_ttl.as_secs(),
    }))
}
