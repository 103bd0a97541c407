//! HTTP endpoints of the ticket API and the operator control panel.

pub mod availability;
pub mod control;
pub mod reserve;
pub mod webhooks;

use crate::checkout::CheckoutProvider;
use crate::extractors::JwtSecretProvider;
use std::sync::Arc;
use turnstile_bus::BufferedPublisher;
use turnstile_inventory::ReservationService;

/// The tier served by the single-tier read path.
pub const BASIC_TIER: &str = "basic";

/// Dependencies of the ticket API (reservation, availability, webhooks).
#[derive(Clone)]
pub struct TicketApiState {
    /// Reservation path over the inventory store.
    pub reservations: Arc<ReservationService>,
    /// Fire-and-forget publisher onto the order queues.
    pub publisher: BufferedPublisher,
    /// Checkout-session creation.
    pub checkout: Arc<dyn CheckoutProvider>,
    /// Shared credential-signing secret.
    pub jwt_secret: Arc<String>,
    /// Frontend base URL for post-payment redirects.
    pub frontend_url: String,
}

impl JwtSecretProvider for TicketApiState {
    fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}
