//! Waiting-room server: WebSocket queue streams.

use std::sync::Arc;
use tracing::info;
use turnstile_queue::RedisQueueStore;
use turnstile_server::bootstrap::{init_tracing, serve};
use turnstile_server::config::Config;
use turnstile_server::routes::waiting_room_router;
use turnstile_server::waiting_room::WaitingRoomState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("turnstile_server=info,turnstile_queue=info,tower_http=warn");

    let config = Config::from_env();
    info!(
        redis = %config.redis.addr,
        port = config.server.port,
        update_interval_ms = config.waiting_room.update_interval_ms,
        admit_batch = config.waiting_room.admit_batch,
        "starting waiting-room server"
    );

    let queue = Arc::new(RedisQueueStore::connect(&config.redis.url()).await?);

    let state = WaitingRoomState {
        queue,
        jwt_secret: Arc::new(config.auth.jwt_secret.clone()),
        update_interval: config.waiting_room.update_interval(),
        admit_batch: config.waiting_room.admit_batch,
    };

    serve(waiting_room_router(state), config.server.port).await?;
    Ok(())
}
