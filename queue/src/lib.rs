//! Waiting-room queue for the Turnstile ticketing core.
//!
//! Each event owns an ordered multiset of waiting members keyed by arrival
//! time (unix seconds); ties break by store insertion order. The waiting-room
//! server inserts and removes entries as client streams come and go, and the
//! [`ReleaseScheduler`] pops the front of the queue at a configured rate to
//! shape admission throughput.
//!
//! Two store implementations:
//!
//! - [`RedisQueueStore`]: the production store, one sorted set per event
//!   under `ws-queue:<event_id>`
//! - [`MemoryQueueStore`]: a deterministic in-process double with the same
//!   ordering semantics, shared by the workspace's tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod memory;
mod redis_store;
mod scheduler;
mod store;

pub use memory::MemoryQueueStore;
pub use redis_store::RedisQueueStore;
pub use scheduler::ReleaseScheduler;
pub use store::{queue_key, QueueError, QueueStore};
