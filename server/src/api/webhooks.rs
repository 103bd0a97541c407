//! Payment-processor webhooks.
//!
//! Both endpoints publish the outcome onto the bus and 303-redirect the
//! buyer to the frontend. Publishing is best-effort: a broker hiccup is
//! the buffered publisher's problem, never the buyer's.

use super::TicketApiState;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;
use turnstile_bus::{
    PaymentCancelled, PaymentSuccess, PAYMENT_CANCELLED_QUEUE, PAYMENT_SUCCESS_QUEUE,
};
use turnstile_core::OrderReferenceId;

/// Query parameters shared by both webhooks.
#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    /// Order the payment outcome belongs to.
    order_reference_id: Option<String>,
}

fn order_reference(params: WebhookParams) -> Result<OrderReferenceId, AppError> {
    params
        .order_reference_id
        .filter(|id| !id.is_empty())
        .map(OrderReferenceId::new)
        .ok_or_else(|| AppError::bad_request("Missing order_reference_id parameter"))
}

/// `GET /webhooks/payment-success?order_reference_id=`
pub async fn payment_success(
    State(state): State<TicketApiState>,
    Query(params): Query<WebhookParams>,
) -> Result<Redirect, AppError> {
    let order_reference_id = order_reference(params)?;
    tracing::info!(order_reference_id = %order_reference_id, "payment succeeded");

    state.publisher.enqueue_json(
        PAYMENT_SUCCESS_QUEUE,
        &PaymentSuccess { order_reference_id },
    );

    Ok(Redirect::to(&format!(
        "{}/order-finished",
        state.frontend_url
    )))
}

/// `GET /webhooks/payment-cancel?order_reference_id=`
pub async fn payment_cancel(
    State(state): State<TicketApiState>,
    Query(params): Query<WebhookParams>,
) -> Result<Redirect, AppError> {
    let order_reference_id = order_reference(params)?;
    tracing::info!(order_reference_id = %order_reference_id, "payment cancelled");

    state.publisher.enqueue_json(
        PAYMENT_CANCELLED_QUEUE,
        &PaymentCancelled {
            order_reference_id,
            status: "cancelled".to_string(),
        },
    );

    Ok(Redirect::to(&format!(
        "{}/order-finished",
        state.frontend_url
    )))
}
