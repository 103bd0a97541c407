//! AMQP work-queue plumbing for the Turnstile core.
//!
//! Three durable queues tie the reservation path to the payment outcome:
//! `order.created`, `order.payment-success` and `order.payment_cancelled`.
//! Consumers use manual acks and nack poison messages without requeue so
//! they dead-letter instead of looping.
//!
//! Publishing on the reservation hot path is fire-and-forget, but routed
//! through a [`BufferedPublisher`], a bounded in-memory buffer drained by
//! a background task that retries with backoff, so a momentary broker
//! outage does not silently drop orders.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod amqp;
mod consumer;
mod envelopes;
mod memory;
mod publisher;

pub use amqp::{AmqpBus, BusError};
pub use consumer::consume_json;
pub use envelopes::{
    OrderCreated, PaymentCancelled, PaymentSuccess, ORDER_CREATED_QUEUE,
    PAYMENT_CANCELLED_QUEUE, PAYMENT_SUCCESS_QUEUE,
};
pub use memory::MemoryBus;
pub use publisher::{BufferedPublisher, Publish};
