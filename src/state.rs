use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::config::Config;
use crate::services::attachment_service::AttachmentPipeline;
use crate::services::notifier::Notifier;
use crate::typing::TypingTracker;
use crate::websocket::ConnectionRegistry;

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub redis: redis::Client,
    pub registry: ConnectionRegistry,
    pub typing: TypingTracker,
    pub attachments: AttachmentPipeline,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        db: Pool<Postgres>,
        redis: redis::Client,
        attachments: AttachmentPipeline,
        notifier: Arc<dyn Notifier>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            redis,
            registry: ConnectionRegistry::new(),
            typing: TypingTracker::new(config.typing_ttl),
            attachments,
            notifier,
            config,
        }
    }
}
