//! In-memory inventory store with real CAS semantics, for tests.

use crate::store::{InventoryError, InventoryStore, VersionedCount};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use turnstile_core::EventId;

/// In-process [`InventoryStore`].
///
/// Versions bump on every write exactly like the real store, so the
/// concurrency properties of the reservation path (no negative counter,
/// no double-decrement on a stale version) can be exercised without an
/// etcd cluster.
#[derive(Default)]
pub struct MemoryInventoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    counters: HashMap<(String, String), VersionedCount>,
    reservations: Vec<(String, u32)>,
}

impl MemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the counter for `(event_id, tier)`, as operators do out-of-band.
    pub fn seed(&self, event_id: &EventId, tier: &str, count: i64) {
        let mut inner = self.inner.lock().expect("inventory lock poisoned");
        inner.counters.insert(
            (event_id.as_str().to_owned(), tier.to_owned()),
            VersionedCount { count, version: 1 },
        );
    }

    /// Advisory reservation records written so far, as `(key, quantity)`.
    #[must_use]
    pub fn reservations(&self) -> Vec<(String, u32)> {
        self.inner
            .lock()
            .expect("inventory lock poisoned")
            .reservations
            .clone()
    }
}

fn ready<T: Send + 'static>(value: T) -> Pin<Box<dyn Future<Output = T> + Send>> {
    Box::pin(std::future::ready(value))
}

impl InventoryStore for MemoryInventoryStore {
    fn get<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<VersionedCount>, InventoryError>> + Send + 'a>>
    {
        let inner = self.inner.lock().expect("inventory lock poisoned");
        let counter = inner
            .counters
            .get(&(event_id.as_str().to_owned(), tier.to_owned()))
            .copied();
        ready(Ok(counter))
    }

    fn compare_and_put<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
        expected_version: i64,
        new_count: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, InventoryError>> + Send + 'a>> {
        let mut inner = self.inner.lock().expect("inventory lock poisoned");
        let key = (event_id.as_str().to_owned(), tier.to_owned());
        let applied = match inner.counters.get_mut(&key) {
            Some(entry) if entry.version == expected_version => {
                *entry = VersionedCount {
                    count: new_count,
                    version: entry.version + 1,
                };
                true
            }
            _ => false,
        };
        ready(Ok(applied))
    }

    fn put_reservation<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
        expires_at: DateTime<Utc>,
        quantity: u32,
    ) -> Pin<Box<dyn Future<Output = Result<(), InventoryError>> + Send + 'a>> {
        let key = crate::store::reservation_key(event_id, tier, expires_at);
        let mut inner = self.inner.lock().expect("inventory lock poisoned");
        inner.reservations.push((key, quantity));
        ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cas_succeeds_only_on_the_observed_version() {
        let store = MemoryInventoryStore::new();
        let event = EventId::new("E1");
        store.seed(&event, "basic", 10);

        let observed = store.get(&event, "basic").await.unwrap().unwrap();
        assert_eq!(observed.count, 10);

        // First writer wins.
        assert!(store
            .compare_and_put(&event, "basic", observed.version, 8)
            .await
            .unwrap());

        // A second write on the stale version loses.
        assert!(!store
            .compare_and_put(&event, "basic", observed.version, 6)
            .await
            .unwrap());

        let after = store.get(&event, "basic").await.unwrap().unwrap();
        assert_eq!(after.count, 8);
        assert_eq!(after.version, observed.version + 1);
    }

    #[tokio::test]
    async fn get_of_unseeded_counter_is_none() {
        let store = MemoryInventoryStore::new();
        assert_eq!(
            store.get(&EventId::new("nope"), "basic").await.unwrap(),
            None
        );
    }
}
