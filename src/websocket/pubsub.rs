//! Cross-instance event fanout over Redis pub/sub. Transport only: nothing
//! durable lives in Redis and there is no replay after reconnect.

use axum::extract::ws::Message;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::websocket::ConnectionRegistry;

const CHANNEL_PREFIX: &str = "conversation:";

fn channel_for(conversation_id: Uuid) -> String {
    format!("{CHANNEL_PREFIX}{conversation_id}")
}

pub async fn publish(
    client: &redis::Client,
    conversation_id: Uuid,
    payload: &str,
) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    conn.publish::<_, _, ()>(channel_for(conversation_id), payload)
        .await
}

/// Subscribe to all conversation channels and replay into the local
/// registry. Reconnects with a fixed backoff; events missed while
/// disconnected are simply dropped.
pub async fn start_psub_listener(client: redis::Client, registry: ConnectionRegistry) {
    loop {
        match listen_once(&client, &registry).await {
            Ok(()) => info!("redis pubsub stream ended; reconnecting"),
            Err(e) => warn!(error = %e, "redis pubsub listener failed; reconnecting"),
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

async fn listen_once(
    client: &redis::Client,
    registry: &ConnectionRegistry,
) -> redis::RedisResult<()> {
    // Pub/sub needs a dedicated connection, not the multiplexed one.
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe(format!("{CHANNEL_PREFIX}*")).await?;
    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel: String = msg.get_channel_name().into();
        let payload: String = msg.get_payload()?;
        if let Some(id_part) = channel.strip_prefix(CHANNEL_PREFIX) {
            if let Ok(conversation_id) = Uuid::parse_str(id_part) {
                registry
                    .broadcast(conversation_id, Message::Text(payload))
                    .await;
            }
        }
    }
    Ok(())
}
