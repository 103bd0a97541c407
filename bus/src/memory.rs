//! In-memory recording bus for tests.

use crate::amqp::BusError;
use crate::publisher::Publish;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every published payload per queue.
///
/// `fail_next(n)` makes the next `n` publishes fail, for exercising the
/// buffered publisher's retry behavior.
#[derive(Default)]
pub struct MemoryBus {
    published: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    failures_remaining: AtomicUsize,
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail with [`BusError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Payloads published to `queue` so far, in order.
    #[must_use]
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.published
            .lock()
            .expect("bus lock poisoned")
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Decode the payloads published to `queue` as JSON values of `T`.
    ///
    /// # Panics
    ///
    /// Panics if a payload is not valid JSON for `T`; tests want to know.
    #[must_use]
    pub fn published_json<T: serde::de::DeserializeOwned>(&self, queue: &str) -> Vec<T> {
        self.published(queue)
            .iter()
            .map(|payload| serde_json::from_slice(payload).expect("payload is not valid JSON"))
            .collect()
    }
}

impl Publish for MemoryBus {
    fn publish<'a>(
        &'a self,
        queue: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + 'a>> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        let result = if remaining > 0
            && self
                .failures_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            Err(BusError::Unavailable("injected failure".into()))
        } else {
            self.published
                .lock()
                .expect("bus lock poisoned")
                .entry(queue.to_owned())
                .or_default()
                .push(payload);
            Ok(())
        };
        Box::pin(std::future::ready(result))
    }
}
