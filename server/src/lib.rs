//! The Turnstile services.
//!
//! Five binaries share this crate:
//!
//! - `waiting-room`: authenticated WebSocket streams into the per-event
//!   queue, position updates, admission-credential mint at the head
//! - `ticket-api`: reservation + checkout, the availability read path and
//!   the payment webhooks
//! - `queue-scheduler`: pops the front of a configured queue on a timer
//! - `queue-control`: operator inspection and mutation of a queue
//! - `order-worker`: consumes the order queues and refills inventory when
//!   a payment is cancelled
//!
//! Every binary builds its dependencies once at startup ([`config::Config`]
//! plus the store clients) and hands them to handlers through typed state;
//! no process-global clients.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod bootstrap;
pub mod checkout;
pub mod config;
pub mod error;
pub mod extractors;
pub mod refill;
pub mod routes;
pub mod waiting_room;
