//! The publish seam and the buffered fire-and-forget publisher.

use crate::amqp::BusError;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use turnstile_core::retry::{retry_with_backoff, RetryPolicy};

/// Anything that can push a message onto a named queue.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn Publish>`), which is
/// how the buffered publisher holds the broker it drains into.
pub trait Publish: Send + Sync {
    /// Publish `payload` to `queue`.
    ///
    /// The returned future resolves to [`BusError`] when the broker
    /// rejects or loses the publish.
    fn publish<'a>(
        &'a self,
        queue: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>>;
}

struct Outgoing {
    queue: &'static str,
    payload: Vec<u8>,
}

/// Fire-and-forget publisher with a bounded buffer and retry.
///
/// The request path only ever enqueues; a background task drains the
/// buffer and retries each publish with exponential backoff. A full buffer
/// or an exhausted retry budget drops the message with an error log; the
/// reservation response never waits on the broker.
#[derive(Clone)]
pub struct BufferedPublisher {
    tx: mpsc::Sender<Outgoing>,
}

impl BufferedPublisher {
    /// Spawn the drain task over `bus`, buffering up to `capacity` messages.
    #[must_use]
    pub fn new(bus: Arc<dyn Publish>, capacity: usize, policy: RetryPolicy) -> Self {
        let (tx, mut rx) = mpsc::channel::<Outgoing>(capacity);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let result = retry_with_backoff(&policy, || {
                    bus.publish(message.queue, message.payload.clone())
                })
                .await;

                if let Err(err) = result {
                    tracing::error!(
                        queue = message.queue,
                        error = %err,
                        "dropping message after exhausting publish retries"
                    );
                }
            }
            tracing::debug!("publish buffer drained and closed");
        });

        Self { tx }
    }

    /// Enqueue `payload` for `queue` without blocking.
    pub fn enqueue(&self, queue: &'static str, payload: Vec<u8>) {
        match self.tx.try_send(Outgoing { queue, payload }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::error!(queue = message.queue, "publish buffer full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                tracing::error!(queue = message.queue, "publish task gone, dropping message");
            }
        }
    }

    /// Serialize `envelope` as JSON and enqueue it.
    pub fn enqueue_json<T: Serialize>(&self, queue: &'static str, envelope: &T) {
        match serde_json::to_vec(envelope) {
            Ok(payload) => self.enqueue(queue, payload),
            Err(err) => {
                tracing::error!(queue, error = %err, "failed to serialize envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBus;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Note {
        text: String,
    }

    #[tokio::test]
    async fn enqueued_messages_reach_the_bus() {
        let bus = Arc::new(MemoryBus::new());
        let publisher = BufferedPublisher::new(bus.clone(), 16, RetryPolicy::default());

        publisher.enqueue_json(
            "order.created",
            &Note {
                text: "hello".into(),
            },
        );

        // Drain task runs concurrently; give it a moment.
        for _ in 0..50 {
            if !bus.published("order.created").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let published = bus.published("order.created");
        assert_eq!(published.len(), 1);
        let note: Note = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(note.text, "hello");
    }

    #[tokio::test]
    async fn transient_broker_failures_are_retried() {
        let bus = Arc::new(MemoryBus::new());
        bus.fail_next(2);
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let publisher = BufferedPublisher::new(bus.clone(), 16, policy);

        publisher.enqueue("order.created", b"payload".to_vec());

        for _ in 0..100 {
            if !bus.published("order.created").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(bus.published("order.created").len(), 1);
    }
}
