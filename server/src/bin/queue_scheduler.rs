//! Release scheduler: pops the front of the watched queue on a timer.

use std::sync::Arc;
use tracing::info;
use turnstile_queue::{RedisQueueStore, ReleaseScheduler};
use turnstile_server::bootstrap::init_tracing;
use turnstile_server::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("turnstile_server=info,turnstile_queue=info");

    let config = Config::from_env();
    if config.scheduler.queue_watcher_key.is_empty() {
        return Err("QUEUE_WATCHER_KEY is required".into());
    }

    info!(
        redis = %config.redis.addr,
        queue_watcher_key = %config.scheduler.queue_watcher_key,
        amount_to_pop = config.scheduler.amount_to_pop,
        ticker_ms = config.scheduler.ticker_ms,
        "starting release scheduler"
    );

    let queue = Arc::new(RedisQueueStore::connect(&config.redis.url()).await?);
    let scheduler = ReleaseScheduler::new(
        queue,
        config.scheduler.event_id(),
        config.scheduler.amount_to_pop,
        config.scheduler.tick(),
    );

    scheduler.run().await;
    Ok(())
}
