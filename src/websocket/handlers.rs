use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::middleware::auth::{verify_token, AuthContext};
use crate::models::conversation::ParticipantRole;
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, WsEvent};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub conversation_id: Uuid,
    /// Browsers cannot set headers on WebSocket upgrades, so the JWT rides
    /// in the query string for this one route.
    pub token: String,
}

/// Client-to-server signals. Typing presence only; message traffic goes over
/// the plain HTTP API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WsInbound {
    #[serde(rename = "typing.started")]
    TypingStarted,
    #[serde(rename = "typing.stopped")]
    TypingStopped,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let ctx = match verify_token(&state.config.jwt_secret, &params.token) {
        Ok(ctx) => ctx,
        Err(_) => return StatusCode::UNAUTHORIZED.into_response(),
    };

    match authorize(&state, &params, &ctx).await {
        Ok(()) => ws.on_upgrade(move |socket| handle_socket(state, params, ctx, socket)),
        Err(status) => status.into_response(),
    }
}

async fn authorize(
    state: &AppState,
    params: &WsParams,
    ctx: &AuthContext,
) -> Result<(), StatusCode> {
    let conversation =
        match ConversationService::get_conversation(&state.db, params.conversation_id).await {
            Ok(c) => c,
            Err(_) => return Err(StatusCode::NOT_FOUND),
        };
    if conversation.is_party(ctx.user_id) || ctx.role == ParticipantRole::Admin {
        Ok(())
    } else {
        warn!(user_id = %ctx.user_id, conversation_id = %params.conversation_id,
            "websocket rejected: not a conversation party");
        Err(StatusCode::FORBIDDEN)
    }
}

async fn handle_socket(state: AppState, params: WsParams, ctx: AuthContext, socket: WebSocket) {
    let conversation_id = params.conversation_id;
    let user_id = ctx.user_id;

    let mut rx = state.registry.add_subscriber(conversation_id).await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                match maybe {
                    Some(msg) => {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(event) = serde_json::from_str::<WsInbound>(&text) {
                            handle_inbound(&state, conversation_id, user_id, event).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // A vanished connection must not leave a stuck indicator.
    if state.typing.is_typing(conversation_id, user_id) {
        state.typing.signal_stopped(conversation_id, user_id);
        broadcast_event(
            &state.registry,
            &state.redis,
            conversation_id,
            WsEvent::TypingStopped { user_id },
        )
        .await;
    }
}

async fn handle_inbound(state: &AppState, conversation_id: Uuid, user_id: Uuid, event: WsInbound) {
    match event {
        WsInbound::TypingStarted => {
            state.typing.signal_typing(conversation_id, user_id);
            broadcast_event(
                &state.registry,
                &state.redis,
                conversation_id,
                WsEvent::TypingStarted { user_id },
            )
            .await;
        }
        WsInbound::TypingStopped => {
            state.typing.signal_stopped(conversation_id, user_id);
            broadcast_event(
                &state.registry,
                &state.redis,
                conversation_id,
                WsEvent::TypingStopped { user_id },
            )
            .await;
        }
    }
}
