//! Inventory counters and the reservation path for the Turnstile core.
//!
//! The available count per `(event, tier)` lives in a strongly-consistent
//! KV store as a versioned integer. All mutations go through a
//! compare-and-swap on the observed version, which makes decrements
//! lock-free and linearizable per key:
//!
//! - [`ReservationService::reserve`]: bounded optimistic-retry decrement,
//!   the only way tickets leave the pool
//! - [`ReservationService::refill`]: the compensating increment applied
//!   when a payment is cancelled
//!
//! A short-TTL Redis cache ([`AvailabilityCache`]) fronts the advisory
//! availability read; it is never consulted for inventory decisions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod etcd;
mod memory;
mod reserve;
mod store;

pub use cache::AvailabilityCache;
pub use etcd::EtcdInventoryStore;
pub use memory::MemoryInventoryStore;
pub use reserve::{ReservationService, ReservePolicy, ReserveError};
pub use store::{counter_key, reservation_key, InventoryError, InventoryStore, VersionedCount};
