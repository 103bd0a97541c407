//! `POST /reserve-tickets`: the purchase funnel's single write endpoint.

use super::TicketApiState;
use crate::error::AppError;
use crate::extractors::SessionUser;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use turnstile_bus::{OrderCreated, ORDER_CREATED_QUEUE};
use turnstile_core::token::validate_admission;
use turnstile_core::{EventId, OrderReferenceId};

/// Request body, camelCase on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveTicketsRequest {
    /// Event to buy into.
    pub event_id: String,
    /// Tier to decrement.
    pub ticket_type: String,
    /// Tickets requested.
    pub quantity: u32,
    /// Admission credential minted by the waiting room.
    #[serde(default)]
    pub token: String,
}

/// Success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveTicketsResponse {
    /// Always `true` on the success path.
    pub success: bool,
    /// Hosted checkout page to redirect the buyer to.
    pub checkout_url: String,
}

/// Reserve tickets and open a checkout session.
///
/// Order of operations: decode (400) → admission credential (401) →
/// CAS decrement (400 on not-found / insufficient / contention, 500 on
/// store failure) → mint order reference → fire-and-forget
/// `order.created` → synchronous checkout-session creation (500 on
/// failure) → `{success, checkoutUrl}`.
pub async fn reserve_tickets(
    State(state): State<TicketApiState>,
    session: SessionUser,
    body: String,
) -> Result<Json<ReserveTicketsResponse>, AppError> {
    let request: ReserveTicketsRequest =
        serde_json::from_str(&body).map_err(|_| AppError::bad_request("Invalid request body"))?;

    if request.quantity == 0 {
        return Err(AppError::bad_request("quantity must be positive"));
    }

    let event_id = EventId::new(request.event_id);

    validate_admission(&request.token, state.jwt_secret.as_bytes(), &event_id).map_err(|err| {
        tracing::info!(event_id = %event_id, user_id = %session.user_id, error = %err, "admission token rejected");
        AppError::unauthorized("Invalid admission token")
    })?;

    tracing::info!(
        event_id = %event_id,
        user_id = %session.user_id,
        tier = %request.ticket_type,
        quantity = request.quantity,
        "reservation requested"
    );

    state
        .reservations
        .reserve(&event_id, &request.ticket_type, request.quantity)
        .await?;

    let order_reference_id = OrderReferenceId::generate();

    // Best-effort: the buffered publisher retries in the background and
    // the response never waits on the broker.
    state.publisher.enqueue_json(
        ORDER_CREATED_QUEUE,
        &OrderCreated {
            event_id: event_id.clone(),
            ticket_type: request.ticket_type.clone(),
            quantity: request.quantity,
            user_id: session.user_id,
            order_reference_id: order_reference_id.clone(),
        },
    );

    let checkout_url = state
        .checkout
        .create_session(
            &order_reference_id,
            &event_id,
            &request.ticket_type,
            request.quantity,
        )
        .await
        .map_err(|err| {
            AppError::internal("Failed to create checkout session").with_source(err.into())
        })?;

    Ok(Json(ReserveTicketsResponse {
        success: true,
        checkout_url,
    }))
}
