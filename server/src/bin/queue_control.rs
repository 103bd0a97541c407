//! Operator control panel API for an event queue.

use std::sync::Arc;
use tracing::info;
use turnstile_queue::RedisQueueStore;
use turnstile_server::api::control::ControlState;
use turnstile_server::bootstrap::{init_tracing, serve};
use turnstile_server::config::Config;
use turnstile_server::routes::control_router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("turnstile_server=info,turnstile_queue=info,tower_http=warn");

    let config = Config::from_env();
    info!(
        redis = %config.redis.addr,
        port = config.server.port,
        "starting queue-control server"
    );

    let queue = Arc::new(RedisQueueStore::connect(&config.redis.url()).await?);
    let state = ControlState { queue };

    serve(control_router(state), config.server.port).await?;
    Ok(())
}
