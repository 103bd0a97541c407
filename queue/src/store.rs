//! The queue-store seam.

use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use turnstile_core::EventId;

/// Failure talking to the queue store.
///
/// Queue errors never fail anything beyond the one client stream that hit
/// them, so a single transparent variant is enough.
#[derive(Debug, thiserror::Error)]
#[error("queue store error: {0}")]
pub struct QueueError(pub String);

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        Self(err.to_string())
    }
}

/// Per-event ordered multiset of waiting members.
///
/// Members are opaque strings: real clients use their decimal user id,
/// operator load-testing inserts synthetic nanosecond-derived ids. Scores
/// are unix seconds; equal scores keep store insertion order.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn QueueStore>`), which
/// is how the services hold their store dependency.
pub trait QueueStore: Send + Sync {
    /// Insert `member` with arrival score `score`.
    fn join<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
        score: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>>;

    /// Remove `member`. Removing an absent member is a no-op.
    fn leave<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>>;

    /// 0-based rank of `member`, or `None` if it is not in the queue.
    fn rank<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u64>, QueueError>> + Send + 'a>>;

    /// Number of members currently queued.
    fn len<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<u64, QueueError>> + Send + 'a>>;

    /// Pop up to `count` front-most members, front first.
    fn pop_front<'a>(
        &'a self,
        event_id: &'a EventId,
        count: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, QueueError>> + Send + 'a>>;

    /// All members in queue order.
    fn members<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, QueueError>> + Send + 'a>>;

    /// Delete the event's queue entirely.
    fn clear<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>>;

    /// Insert `count` synthetic entries for operator load testing.
    ///
    /// Members are nanosecond-derived identifiers with current-second
    /// scores, indistinguishable from real clients to the scheduler and
    /// the position math.
    fn add_synthetic<'a>(
        &'a self,
        event_id: &'a EventId,
        count: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        Box::pin(async move {
            #[allow(clippy::cast_sign_loss)] // wall clock is past the epoch
            let score = Utc::now().timestamp().max(0) as u64;
            let base = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            for i in 0..count {
                #[allow(clippy::cast_possible_wrap)]
                let member = (base + i as i64).to_string();
                self.join(event_id, &member, score).await?;
            }
            Ok(())
        })
    }
}

/// Key of the sorted set backing an event's queue.
#[must_use]
pub fn queue_key(event_id: &EventId) -> String {
    format!("ws-queue:{event_id}")
}
