//! Redis sorted-set implementation of [`QueueStore`].

use crate::store::{queue_key, QueueError, QueueStore};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::pin::Pin;
use turnstile_core::EventId;

/// Queue store backed by one Redis sorted set per event.
///
/// Uses a [`ConnectionManager`] for pooling and automatic reconnection;
/// the manager is cheap to clone, so every operation works on its own
/// handle and no lock is held server-side.
#[derive(Clone)]
pub struct RedisQueueStore {
    conn_manager: ConnectionManager,
}

impl RedisQueueStore {
    /// Connect to Redis at `redis_url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the initial
    /// connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client = Client::open(redis_url)
            .map_err(|e| QueueError(format!("failed to create Redis client: {e}")))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError(format!("failed to connect to Redis: {e}")))?;
        Ok(Self { conn_manager })
    }
}

impl QueueStore for RedisQueueStore {
    fn join<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
        score: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            let _: () = conn.zadd(queue_key(event_id), member, score).await?;
            tracing::debug!(event_id = %event_id, member, score, "added member to queue");
            Ok(())
        })
    }

    fn leave<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            let _: () = conn.zrem(queue_key(event_id), member).await?;
            tracing::debug!(event_id = %event_id, member, "removed member from queue");
            Ok(())
        })
    }

    fn rank<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u64>, QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            let rank: Option<i64> = conn.zrank(queue_key(event_id), member).await?;
            #[allow(clippy::cast_sign_loss)] // ZRANK is never negative
            Ok(rank.map(|r| r as u64))
        })
    }

    fn len<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<u64, QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            let size: u64 = conn.zcard(queue_key(event_id)).await?;
            Ok(size)
        })
    }

    fn pop_front<'a>(
        &'a self,
        event_id: &'a EventId,
        count: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let popped: Vec<(String, f64)> =
                conn.zpopmin(queue_key(event_id), count as isize).await?;
            Ok(popped.into_iter().map(|(member, _score)| member).collect())
        })
    }

    fn members<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            let members: Vec<String> = conn.zrange(queue_key(event_id), 0, -1).await?;
            Ok(members)
        })
    }

    fn clear<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        let mut conn = self.conn_manager.clone();
        Box::pin(async move {
            let _: () = conn.del(queue_key(event_id)).await?;
            tracing::info!(event_id = %event_id, "cleared queue");
            Ok(())
        })
    }
}
