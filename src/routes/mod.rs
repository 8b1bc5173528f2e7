use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::middleware::auth::auth_middleware;
use crate::middleware::logging::add_tracing;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod admin;
pub mod attachments;
pub mod conversations;
pub mod messages;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(conversations::router())
        .merge(messages::router())
        .merge(attachments::router(&state))
        .merge(admin::router())
        .route("/ws", get(ws_handler));

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    add_tracing(router)
}

async fn health() -> &'static str {
    "ok"
}
