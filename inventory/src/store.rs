//! The inventory-store seam.

use chrono::{DateTime, SecondsFormat, Utc};
use std::future::Future;
use std::pin::Pin;
use turnstile_core::EventId;

/// An observed counter value together with the version that produced it.
///
/// The version is opaque beyond equality: it changes on every write, and a
/// conditional put succeeds only when the key's version still equals the
/// one observed at read time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionedCount {
    /// Tickets currently available. Never negative.
    pub count: i64,
    /// Store version of the key at read time.
    pub version: i64,
}

/// Failure talking to the inventory store.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The backend rejected or failed the operation.
    #[error("inventory store error: {0}")]
    Store(String),
    /// The operation did not complete within the per-operation deadline.
    #[error("inventory store operation timed out")]
    Timeout,
    /// The stored value was not a decimal integer.
    #[error("corrupt counter value: {0:?}")]
    CorruptValue(String),
}

impl From<etcd_client::Error> for InventoryError {
    fn from(err: etcd_client::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Versioned per-`(event, tier)` counter with conditional writes.
///
/// There is no unconditional mutation: every write observes a version
/// first, so the store enforces a single logical writer per key at any
/// instant.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` to enable trait object usage (`Arc<dyn InventoryStore>`),
/// which is how the reservation service holds its store dependency.
pub trait InventoryStore: Send + Sync {
    /// Read the counter for `(event_id, tier)`, or `None` if it was never
    /// seeded.
    fn get<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<VersionedCount>, InventoryError>> + Send + 'a>>;

    /// Write `new_count` iff the key's version still equals
    /// `expected_version`. Returns whether the write was applied.
    fn compare_and_put<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
        expected_version: i64,
        new_count: i64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, InventoryError>> + Send + 'a>>;

    /// Record an advisory reservation of `quantity` tickets expiring at
    /// `expires_at`. Informational only; the counter is the source of truth.
    fn put_reservation<'a>(
        &'a self,
        event_id: &'a EventId,
        tier: &'a str,
        expires_at: DateTime<Utc>,
        quantity: u32,
    ) -> Pin<Box<dyn Future<Output = Result<(), InventoryError>> + Send + 'a>>;
}

/// Key of the authoritative available-count counter.
#[must_use]
pub fn counter_key(event_id: &EventId, tier: &str) -> String {
    format!("concert:{event_id}:available:{tier}")
}

/// Key of an advisory reservation record.
#[must_use]
pub fn reservation_key(event_id: &EventId, tier: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "reservation:{event_id}:{tier}:{}",
        expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
