//! The order worker: ties payment outcomes back to inventory.
//!
//! `order.created` tells us what a reference stands for; a later
//! `order.payment_cancelled` returns exactly that quantity to the counter
//! through the same CAS loop the reservation used, and
//! `order.payment-success` retires the reference. The index is in-memory:
//! a worker restart forgets in-flight orders, which loses at most their
//! refunds, never sells a ticket twice; replay the dead-letter queue to
//! recover.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use turnstile_bus::{OrderCreated, PaymentCancelled, PaymentSuccess};
use turnstile_core::{EventId, OrderReferenceId};
use turnstile_inventory::{ReservationService, ReserveError};

/// What an order reference stands for until its payment settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingOrder {
    /// Event the tickets belong to.
    pub event_id: EventId,
    /// Tier that was decremented.
    pub ticket_type: String,
    /// Tickets reserved.
    pub quantity: u32,
}

/// `order_reference_id` → [`PendingOrder`] index.
#[derive(Default)]
pub struct OrderIndex {
    inner: Mutex<HashMap<String, PendingOrder>>,
}

impl OrderIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, reference: &OrderReferenceId, order: PendingOrder) {
        self.inner
            .lock()
            .expect("order index lock poisoned")
            .insert(reference.as_str().to_owned(), order);
    }

    fn take(&self, reference: &OrderReferenceId) -> Option<PendingOrder> {
        self.inner
            .lock()
            .expect("order index lock poisoned")
            .remove(reference.as_str())
    }

    /// Orders still awaiting a payment outcome.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().expect("order index lock poisoned").len()
    }
}

/// A handler failure the consume loop turns into a dead-letter nack.
#[derive(Debug, thiserror::Error)]
#[error("refill failed for order {order_reference_id}: {source}")]
pub struct RefillFailed {
    order_reference_id: OrderReferenceId,
    source: ReserveError,
}

/// Consumer logic behind the `order-worker` binary.
pub struct OrderWorker {
    reservations: Arc<ReservationService>,
    index: Arc<OrderIndex>,
}

impl OrderWorker {
    /// Build a worker refilling through `reservations`.
    #[must_use]
    pub fn new(reservations: Arc<ReservationService>, index: Arc<OrderIndex>) -> Self {
        Self {
            reservations,
            index,
        }
    }

    /// `order.created`: remember what the reference stands for.
    pub fn handle_order_created(&self, envelope: OrderCreated) {
        tracing::info!(
            order_reference_id = %envelope.order_reference_id,
            event_id = %envelope.event_id,
            tier = %envelope.ticket_type,
            quantity = envelope.quantity,
            "tracking order"
        );
        self.index.record(
            &envelope.order_reference_id,
            PendingOrder {
                event_id: envelope.event_id,
                ticket_type: envelope.ticket_type,
                quantity: envelope.quantity,
            },
        );
    }

    /// `order.payment-success`: the order settled, the reference is done.
    pub fn handle_payment_success(&self, envelope: PaymentSuccess) {
        match self.index.take(&envelope.order_reference_id) {
            Some(order) => tracing::info!(
                order_reference_id = %envelope.order_reference_id,
                event_id = %order.event_id,
                "order settled"
            ),
            None => tracing::debug!(
                order_reference_id = %envelope.order_reference_id,
                "payment success for unknown order reference"
            ),
        }
    }

    /// `order.payment_cancelled`: return the order's quantity to the pool.
    ///
    /// Unknown references ack cleanly: the outcome may be replayed or the
    /// index may have been lost to a restart, and refilling nothing is the
    /// safe direction.
    ///
    /// # Errors
    ///
    /// Returns [`RefillFailed`] when the CAS refill fails; the order stays
    /// indexed and the consume loop dead-letters the message for replay.
    pub async fn handle_payment_cancelled(
        &self,
        envelope: PaymentCancelled,
    ) -> Result<(), RefillFailed> {
        let Some(order) = self.index.take(&envelope.order_reference_id) else {
            tracing::warn!(
                order_reference_id = %envelope.order_reference_id,
                "cancellation for unknown order reference, nothing to refill"
            );
            return Ok(());
        };

        match self
            .reservations
            .refill(&order.event_id, &order.ticket_type, order.quantity)
            .await
        {
            Ok(available) => {
                tracing::info!(
                    order_reference_id = %envelope.order_reference_id,
                    event_id = %order.event_id,
                    tier = %order.ticket_type,
                    refilled = order.quantity,
                    available,
                    "refilled inventory after cancellation"
                );
                Ok(())
            }
            Err(ReserveError::EventNotFound) => {
                // Counter gone (event torn down); nothing left to refill.
                tracing::warn!(
                    order_reference_id = %envelope.order_reference_id,
                    event_id = %order.event_id,
                    "counter missing on refill, dropping"
                );
                Ok(())
            }
            Err(source) => {
                let reference = envelope.order_reference_id.clone();
                self.index.record(&envelope.order_reference_id, order);
                Err(RefillFailed {
                    order_reference_id: reference,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::UserId;
    use turnstile_inventory::{InventoryStore, MemoryInventoryStore, ReservePolicy};

    fn worker_over(store: Arc<MemoryInventoryStore>) -> OrderWorker {
        let reservations = Arc::new(ReservationService::new(
            store,
            None,
            ReservePolicy::default(),
        ));
        OrderWorker::new(reservations, Arc::new(OrderIndex::new()))
    }

    fn order(reference: &str, quantity: u32) -> OrderCreated {
        OrderCreated {
            event_id: EventId::new("E1"),
            ticket_type: "basic".into(),
            quantity,
            user_id: UserId::new(7),
            order_reference_id: OrderReferenceId::new(reference),
        }
    }

    #[tokio::test]
    async fn cancellation_refills_the_reserved_quantity() {
        let store = Arc::new(MemoryInventoryStore::new());
        let event = EventId::new("E1");
        store.seed(&event, "basic", 100);
        let worker = worker_over(store.clone());

        // Reserve 4 through the service, as the ticket API would.
        worker
            .reservations
            .reserve(&event, "basic", 4)
            .await
            .unwrap();
        worker.handle_order_created(order("ord-1", 4));

        worker
            .handle_payment_cancelled(PaymentCancelled {
                order_reference_id: OrderReferenceId::new("ord-1"),
                status: "cancelled".into(),
            })
            .await
            .unwrap();

        assert_eq!(store.get(&event, "basic").await.unwrap().unwrap().count, 100);
        assert_eq!(worker.index.pending(), 0);
    }

    #[tokio::test]
    async fn unknown_reference_acks_without_refilling() {
        let store = Arc::new(MemoryInventoryStore::new());
        let event = EventId::new("E1");
        store.seed(&event, "basic", 10);
        let worker = worker_over(store.clone());

        worker
            .handle_payment_cancelled(PaymentCancelled {
                order_reference_id: OrderReferenceId::new("never-seen"),
                status: "cancelled".into(),
            })
            .await
            .unwrap();

        assert_eq!(store.get(&event, "basic").await.unwrap().unwrap().count, 10);
    }

    #[tokio::test]
    async fn settled_orders_are_not_refilled_on_a_later_cancel() {
        let store = Arc::new(MemoryInventoryStore::new());
        let event = EventId::new("E1");
        store.seed(&event, "basic", 10);
        let worker = worker_over(store.clone());

        worker.handle_order_created(order("ord-2", 3));
        worker.handle_payment_success(PaymentSuccess {
            order_reference_id: OrderReferenceId::new("ord-2"),
        });

        // A stray cancel after settlement must not inflate inventory.
        worker
            .handle_payment_cancelled(PaymentCancelled {
                order_reference_id: OrderReferenceId::new("ord-2"),
                status: "cancelled".into(),
            })
            .await
            .unwrap();

        assert_eq!(store.get(&event, "basic").await.unwrap().unwrap().count, 10);
    }

    #[tokio::test]
    async fn cancellation_with_missing_counter_is_dropped() {
        let store = Arc::new(MemoryInventoryStore::new());
        let worker = worker_over(store);

        worker.handle_order_created(order("ord-3", 2));
        // No counter seeded for E1: refill finds nothing, worker acks.
        worker
            .handle_payment_cancelled(PaymentCancelled {
                order_reference_id: OrderReferenceId::new("ord-3"),
                status: "cancelled".into(),
            })
            .await
            .unwrap();
        assert_eq!(worker.index.pending(), 0);
    }
}
