use std::net::SocketAddr;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use tracing::info;

use talentlink_messaging::config::Config;
use talentlink_messaging::db;
use talentlink_messaging::error::AppError;
use talentlink_messaging::logging;
use talentlink_messaging::routes;
use talentlink_messaging::services::attachment_service::AttachmentPipeline;
use talentlink_messaging::services::notifier::LogNotifier;
use talentlink_messaging::state::AppState;
use talentlink_messaging::storage::S3Storage;
use talentlink_messaging::websocket::pubsub;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let config = Arc::new(Config::from_env()?);

    let pool = db::init_pool(&config.database_url).await?;
    db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| AppError::Config(format!("migrations: {e}")))?;

    let redis = redis::Client::open(config.redis_url.as_str())
        .map_err(|e| AppError::Config(format!("redis url: {e}")))?;

    let mut aws = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint) = &config.s3_endpoint {
        aws = aws.endpoint_url(endpoint);
    }
    let sdk_config = aws.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        // Path-style addressing for minio and friends.
        .force_path_style(config.s3_endpoint.is_some())
        .build();
    let storage = Arc::new(S3Storage::new(
        aws_sdk_s3::Client::from_conf(s3_config),
        config.attachment_bucket.clone(),
    ));

    let state = AppState::new(
        pool,
        redis.clone(),
        AttachmentPipeline::new(storage, &config),
        Arc::new(LogNotifier),
        config.clone(),
    );

    tokio::spawn(pubsub::start_psub_listener(redis, state.registry.clone()));

    let app = routes::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    info!(%addr, "messaging service listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    Ok(())
}
