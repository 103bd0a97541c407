//! Short-TTL Redis cache over the availability read path.
//!
//! Opportunistic only: populated on read-miss, refreshed after a successful
//! decrement, evicted purely by TTL. Cached values are never trusted for
//! inventory decisions; those go through the CAS path.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use turnstile_core::EventId;

/// Read cache for per-`(event, tier)` availability, keyed
/// `event:<event_id>:available_tickets:<tier>`.
#[derive(Clone)]
pub struct AvailabilityCache {
    conn_manager: ConnectionManager,
    ttl: Duration,
}

impl AvailabilityCache {
    /// Connect to Redis at `redis_url`; cached entries live for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns the Redis error if the initial connection fails.
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, redis::RedisError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;
        Ok(Self { conn_manager, ttl })
    }

    fn key(event_id: &EventId, tier: &str) -> String {
        format!("event:{event_id}:available_tickets:{tier}")
    }

    /// Cached count, or `None` on miss.
    ///
    /// # Errors
    ///
    /// Returns the Redis error on connection failure.
    pub async fn get(&self, event_id: &EventId, tier: &str) -> Result<Option<i64>, redis::RedisError> {
        let mut conn = self.conn_manager.clone();
        conn.get(Self::key(event_id, tier)).await
    }

    /// Store `count` with the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns the Redis error on connection failure.
    pub async fn set(&self, event_id: &EventId, tier: &str, count: i64) -> Result<(), redis::RedisError> {
        let mut conn = self.conn_manager.clone();
        conn.set_ex(Self::key(event_id, tier), count, self.ttl.as_secs())
            .await
    }

    /// Refresh the cache from a detached task; losing the write is fine.
    pub fn refresh_detached(&self, event_id: &EventId, tier: &str, count: i64) {
        let cache = self.clone();
        let event_id = event_id.clone();
        let tier = tier.to_owned();
        tokio::spawn(async move {
            if let Err(err) = cache.set(&event_id, &tier, count).await {
                tracing::warn!(
                    event_id = %event_id,
                    tier = %tier,
                    error = %err,
                    "availability cache refresh failed"
                );
            }
        });
    }
}
