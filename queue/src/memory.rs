//! In-memory queue store for tests and local development.

use crate::store::{QueueError, QueueStore};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use turnstile_core::EventId;

#[derive(Clone, Debug)]
struct Entry {
    member: String,
    score: u64,
    seq: u64,
}

/// Deterministic in-process [`QueueStore`].
///
/// Keeps the sorted-set contract: ordered by `(score, insertion order)`,
/// duplicate joins overwrite the member's score. Intended for tests; the
/// production store is [`crate::RedisQueueStore`].
#[derive(Default)]
pub struct MemoryQueueStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, Vec<Entry>>,
    next_seq: u64,
}

impl MemoryQueueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_queue<T>(&self, event_id: &EventId, f: impl FnOnce(&mut Vec<Entry>, u64) -> T) -> T {
        let mut inner = self.inner.lock().expect("queue store lock poisoned");
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let queue = inner.queues.entry(event_id.as_str().to_owned()).or_default();
        f(queue, seq)
    }
}

fn sort_queue(queue: &mut [Entry]) {
    queue.sort_by(|a, b| a.score.cmp(&b.score).then(a.seq.cmp(&b.seq)));
}

fn ready<T: Send + 'static>(value: T) -> Pin<Box<dyn Future<Output = T> + Send>> {
    Box::pin(std::future::ready(value))
}

impl QueueStore for MemoryQueueStore {
    fn join<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
        score: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        self.with_queue(event_id, |queue, seq| {
            queue.retain(|e| e.member != member);
            queue.push(Entry {
                member: member.to_owned(),
                score,
                seq,
            });
            sort_queue(queue);
        });
        ready(Ok(()))
    }

    fn leave<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        self.with_queue(event_id, |queue, _| {
            queue.retain(|e| e.member != member);
        });
        ready(Ok(()))
    }

    fn rank<'a>(
        &'a self,
        event_id: &'a EventId,
        member: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<u64>, QueueError>> + Send + 'a>> {
        let rank = self.with_queue(event_id, |queue, _| {
            queue
                .iter()
                .position(|e| e.member == member)
                .map(|p| p as u64)
        });
        ready(Ok(rank))
    }

    fn len<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<u64, QueueError>> + Send + 'a>> {
        let len = self.with_queue(event_id, |queue, _| queue.len() as u64);
        ready(Ok(len))
    }

    fn pop_front<'a>(
        &'a self,
        event_id: &'a EventId,
        count: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, QueueError>> + Send + 'a>> {
        let popped = self.with_queue(event_id, |queue, _| {
            let take = (count as usize).min(queue.len());
            queue.drain(..take).map(|e| e.member).collect()
        });
        ready(Ok(popped))
    }

    fn members<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, QueueError>> + Send + 'a>> {
        let members = self.with_queue(event_id, |queue, _| {
            queue.iter().map(|e| e.member.clone()).collect()
        });
        ready(Ok(members))
    }

    fn clear<'a>(
        &'a self,
        event_id: &'a EventId,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueueError>> + Send + 'a>> {
        self.with_queue(event_id, |queue, _| queue.clear());
        ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> EventId {
        EventId::new("E1")
    }

    #[tokio::test]
    async fn orders_by_score_then_insertion() {
        let store = MemoryQueueStore::new();
        store.join(&event(), "late", 200).await.unwrap();
        store.join(&event(), "first", 100).await.unwrap();
        store.join(&event(), "second", 100).await.unwrap();

        assert_eq!(
            store.members(&event()).await.unwrap(),
            vec!["first", "second", "late"]
        );
        assert_eq!(store.rank(&event(), "second").await.unwrap(), Some(1));
        assert_eq!(store.rank(&event(), "absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pop_front_removes_in_fifo_order() {
        let store = MemoryQueueStore::new();
        for (i, member) in ["a", "b", "c", "d"].iter().enumerate() {
            store.join(&event(), member, 100 + i as u64).await.unwrap();
        }

        let popped = store.pop_front(&event(), 3).await.unwrap();
        assert_eq!(popped, vec!["a", "b", "c"]);
        assert_eq!(store.len(&event()).await.unwrap(), 1);
        assert_eq!(store.rank(&event(), "d").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn leave_and_clear() {
        let store = MemoryQueueStore::new();
        store.join(&event(), "a", 1).await.unwrap();
        store.join(&event(), "b", 2).await.unwrap();

        store.leave(&event(), "a").await.unwrap();
        assert_eq!(store.len(&event()).await.unwrap(), 1);

        // Removing an absent member is a no-op.
        store.leave(&event(), "a").await.unwrap();
        assert_eq!(store.len(&event()).await.unwrap(), 1);

        store.clear(&event()).await.unwrap();
        assert_eq!(store.len(&event()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn add_synthetic_inserts_distinct_members() {
        let store = MemoryQueueStore::new();
        store.add_synthetic(&event(), 10).await.unwrap();

        let members = store.members(&event()).await.unwrap();
        assert_eq!(members.len(), 10);

        let mut deduped = members.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 10);

        // Synthetic members pop like real ones.
        let popped = store.pop_front(&event(), 3).await.unwrap();
        assert_eq!(popped, members[..3].to_vec());
    }
}
