//! The reservation path: optimistic-retry decrement and its compensating
//! increment.
//!
//! Inventory is a hot key under flash-sale load, so the decrement never
//! locks: it reads the counter with its version, computes the new value,
//! and issues a version-conditional put. Losing the race costs one short
//! sleep and another attempt, bounded by the retry budget.

use crate::cache::AvailabilityCache;
use crate::store::{InventoryError, InventoryStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use turnstile_core::EventId;

/// Bounds on the optimistic retry loop.
#[derive(Clone, Debug)]
pub struct ReservePolicy {
    /// Attempts before giving up with [`ReserveError::TooManyRetries`].
    pub max_retries: u32,
    /// Sleep between attempts after losing a CAS race.
    pub retry_delay: Duration,
    /// Advisory lifetime written into reservation records.
    pub reservation_timeout: Duration,
}

impl Default for ReservePolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            retry_delay: Duration::from_millis(10),
            reservation_timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Why a reservation (or refill) did not go through.
#[derive(Debug, thiserror::Error)]
pub enum ReserveError {
    /// No counter exists for the requested event and tier.
    #[error("concert not found")]
    EventNotFound,
    /// The counter holds fewer tickets than requested.
    #[error("not enough tickets")]
    Insufficient {
        /// Tickets still available.
        available: i64,
        /// Tickets requested.
        requested: u32,
    },
    /// Every attempt lost the CAS race.
    #[error("too many retries")]
    TooManyRetries {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The store itself failed.
    #[error(transparent)]
    Store(#[from] InventoryError),
}

/// Atomic ticket reservation over a versioned counter store.
pub struct ReservationService {
    store: Arc<dyn InventoryStore>,
    cache: Option<AvailabilityCache>,
    policy: ReservePolicy,
}

impl ReservationService {
    /// Build the service. Pass `None` for the cache in environments without
    /// the read-path Redis (tests, workers).
    #[must_use]
    pub fn new(
        store: Arc<dyn InventoryStore>,
        cache: Option<AvailabilityCache>,
        policy: ReservePolicy,
    ) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    /// Reserve `quantity` tickets, returning the remaining count.
    ///
    /// # Errors
    ///
    /// [`ReserveError::EventNotFound`] when the counter was never seeded,
    /// [`ReserveError::Insufficient`] when fewer than `quantity` remain,
    /// [`ReserveError::TooManyRetries`] when contention exhausts the retry
    /// budget, [`ReserveError::Store`] on backend failure.
    pub async fn reserve(
        &self,
        event_id: &EventId,
        tier: &str,
        quantity: u32,
    ) -> Result<i64, ReserveError> {
        for attempt in 0..self.policy.max_retries {
            let Some(current) = self.store.get(event_id, tier).await? else {
                return Err(ReserveError::EventNotFound);
            };

            if current.count < i64::from(quantity) {
                return Err(ReserveError::Insufficient {
                    available: current.count,
                    requested: quantity,
                });
            }

            let new_count = current.count - i64::from(quantity);
            if self
                .store
                .compare_and_put(event_id, tier, current.version, new_count)
                .await?
            {
                let expires_at = Utc::now()
                    + chrono::Duration::from_std(self.policy.reservation_timeout)
                        .unwrap_or_else(|_| chrono::Duration::minutes(15));
                // The record is advisory; a failed write must not undo a
                // successful decrement.
                if let Err(err) = self
                    .store
                    .put_reservation(event_id, tier, expires_at, quantity)
                    .await
                {
                    tracing::warn!(
                        event_id = %event_id,
                        tier,
                        error = %err,
                        "failed to write reservation record"
                    );
                }

                if let Some(cache) = &self.cache {
                    cache.refresh_detached(event_id, tier, new_count);
                }

                tracing::info!(
                    event_id = %event_id,
                    tier,
                    quantity,
                    remaining = new_count,
                    attempt,
                    "reserved tickets"
                );
                return Ok(new_count);
            }

            tracing::debug!(
                event_id = %event_id,
                tier,
                attempt,
                "lost reservation race, retrying"
            );
            sleep(self.policy.retry_delay).await;
        }

        Err(ReserveError::TooManyRetries {
            attempts: self.policy.max_retries,
        })
    }

    /// Return `quantity` tickets to the pool, the compensating action for a
    /// cancelled payment. Returns the new count.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`reserve`](Self::reserve), minus
    /// [`ReserveError::Insufficient`].
    pub async fn refill(
        &self,
        event_id: &EventId,
        tier: &str,
        quantity: u32,
    ) -> Result<i64, ReserveError> {
        for attempt in 0..self.policy.max_retries {
            let Some(current) = self.store.get(event_id, tier).await? else {
                return Err(ReserveError::EventNotFound);
            };

            let new_count = current.count + i64::from(quantity);
            if self
                .store
                .compare_and_put(event_id, tier, current.version, new_count)
                .await?
            {
                if let Some(cache) = &self.cache {
                    cache.refresh_detached(event_id, tier, new_count);
                }

                tracing::info!(
                    event_id = %event_id,
                    tier,
                    quantity,
                    available = new_count,
                    attempt,
                    "refilled tickets after cancellation"
                );
                return Ok(new_count);
            }

            sleep(self.policy.retry_delay).await;
        }

        Err(ReserveError::TooManyRetries {
            attempts: self.policy.max_retries,
        })
    }

    /// Advisory availability: cache first, then the authoritative counter.
    ///
    /// A miss repopulates the cache from a detached task. A counter that was
    /// never seeded reads as zero here; only the reservation path treats
    /// that as an error.
    ///
    /// # Errors
    ///
    /// [`ReserveError::Store`] when the authoritative read fails; cache
    /// failures only fall through to the store.
    pub async fn available(&self, event_id: &EventId, tier: &str) -> Result<i64, ReserveError> {
        if let Some(cache) = &self.cache {
            match cache.get(event_id, tier).await {
                Ok(Some(count)) => return Ok(count),
                Ok(None) => {
                    tracing::debug!(event_id = %event_id, tier, "availability cache miss");
                }
                Err(err) => {
                    tracing::warn!(event_id = %event_id, tier, error = %err, "availability cache read failed");
                }
            }
        }

        let count = self
            .store
            .get(event_id, tier)
            .await?
            .map_or(0, |c| c.count);

        if let Some(cache) = &self.cache {
            cache.refresh_detached(event_id, tier, count);
        }

        Ok(count)
    }
}
