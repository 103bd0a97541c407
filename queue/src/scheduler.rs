//! Release scheduler: pops the front of a queue at a fixed rate.
//!
//! Popping advances every remaining client's rank, which the waiting-room
//! streams pick up on their next update. The scheduler is deliberately
//! event-blind: it does not know whether a popped member is still
//! connected. Popping a ghost entry is harmless: the owning stream is
//! either gone already or its remove-on-exit finds nothing to remove.

use crate::store::QueueStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use turnstile_core::EventId;

/// Periodically releases the `amount_to_pop` front-most queue members.
///
/// One scheduler instance watches one event queue; running several events
/// means running several instances.
pub struct ReleaseScheduler {
    store: Arc<dyn QueueStore>,
    event_id: EventId,
    amount_to_pop: u64,
    tick: Duration,
}

impl ReleaseScheduler {
    /// Build a scheduler over `store` for `event_id`.
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        event_id: EventId,
        amount_to_pop: u64,
        tick: Duration,
    ) -> Self {
        Self {
            store,
            event_id,
            amount_to_pop,
            tick,
        }
    }

    /// Pop once and report how many members were released.
    ///
    /// Store errors are logged and swallowed: a missed tick only delays
    /// admission, the next tick catches up.
    pub async fn tick(&self) -> usize {
        match self.store.pop_front(&self.event_id, self.amount_to_pop).await {
            Ok(popped) if popped.is_empty() => {
                tracing::debug!(event_id = %self.event_id, "no members to pop from queue");
                0
            }
            Ok(popped) => {
                tracing::info!(
                    event_id = %self.event_id,
                    released = popped.len(),
                    front = %popped[0],
                    "released members from queue"
                );
                popped.len()
            }
            Err(err) => {
                tracing::error!(event_id = %self.event_id, error = %err, "queue pop failed");
                0
            }
        }
    }

    /// Run the pop loop forever.
    pub async fn run(&self) {
        tracing::info!(
            event_id = %self.event_id,
            amount_to_pop = self.amount_to_pop,
            tick_ms = self.tick.as_millis(),
            "release scheduler started"
        );

        let mut ticker = interval(self.tick);
        // The first interval tick fires immediately; skip it so the queue
        // gets a full period before the first release.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryQueueStore;

    fn event() -> EventId {
        EventId::new("E1")
    }

    async fn seeded_store(n: u64) -> Arc<MemoryQueueStore> {
        let store = Arc::new(MemoryQueueStore::new());
        for i in 0..n {
            store
                .join(&event(), &format!("user-{i}"), 100 + i)
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn tick_releases_front_most_members() {
        let store = seeded_store(10).await;
        let scheduler =
            ReleaseScheduler::new(store.clone(), event(), 3, Duration::from_millis(10));

        assert_eq!(scheduler.tick().await, 3);

        // The three front-most are gone and everyone else moved up by 3.
        assert_eq!(store.len(&event()).await.unwrap(), 7);
        assert_eq!(store.rank(&event(), "user-3").await.unwrap(), Some(0));
        assert_eq!(store.rank(&event(), "user-9").await.unwrap(), Some(6));
        assert_eq!(store.rank(&event(), "user-0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tick_on_empty_queue_is_harmless() {
        let store = Arc::new(MemoryQueueStore::new());
        let scheduler = ReleaseScheduler::new(store, event(), 5, Duration::from_millis(10));
        assert_eq!(scheduler.tick().await, 0);
    }

    #[tokio::test]
    async fn tick_pops_at_most_the_configured_amount() {
        let store = seeded_store(2).await;
        let scheduler =
            ReleaseScheduler::new(store.clone(), event(), 5, Duration::from_millis(10));

        assert_eq!(scheduler.tick().await, 2);
        assert_eq!(store.len(&event()).await.unwrap(), 0);
    }
}
