//! Wire envelopes carried on the order queues.
//!
//! Field names are the wire contract shared with the downstream order
//! materializer; snake_case JSON throughout.

use serde::{Deserialize, Serialize};
use turnstile_core::{EventId, OrderReferenceId, UserId};

/// Queue carrying freshly-reserved orders to the materializer.
pub const ORDER_CREATED_QUEUE: &str = "order.created";
/// Queue carrying confirmed payments.
pub const PAYMENT_SUCCESS_QUEUE: &str = "order.payment-success";
/// Queue carrying cancelled payments, triggering inventory refill.
pub const PAYMENT_CANCELLED_QUEUE: &str = "order.payment_cancelled";

/// Published after a successful inventory decrement, before checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// Event the tickets belong to.
    pub event_id: EventId,
    /// Tier that was decremented.
    pub ticket_type: String,
    /// Tickets reserved.
    pub quantity: u32,
    /// Buyer.
    pub user_id: UserId,
    /// Reference tying this order to its payment outcome.
    pub order_reference_id: OrderReferenceId,
}

/// Published when the payment processor reports success.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuccess {
    /// Reference of the completed order.
    pub order_reference_id: OrderReferenceId,
}

/// Published when the payment processor reports cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCancelled {
    /// Reference of the abandoned order.
    pub order_reference_id: OrderReferenceId,
    /// Always `"cancelled"` as emitted by the webhook handler.
    pub status: String,
}
