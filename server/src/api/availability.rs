//! `GET /get-available-tickets`: the advisory availability read.
//!
//! Gated on the admission credential: availability is only visible after
//! reaching the queue head, keeping the waiting room uninformative.

use super::{TicketApiState, BASIC_TIER};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use turnstile_core::token::validate_admission;
use turnstile_core::EventId;

/// Query parameters of the availability read.
#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    /// Event to query.
    #[serde(rename = "eventId")]
    event_id: Option<String>,
    /// Admission credential gating the read.
    admission_token: Option<String>,
}

/// Response body, camelCase on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketAvailabilityResponse {
    /// Event queried.
    pub event_id: String,
    /// Availability per tier.
    pub available_tickets: Vec<TicketAvailabilityEntry>,
}

/// One tier's availability.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketAvailabilityEntry {
    /// Tier name.
    pub ticket_type: String,
    /// Tickets available (cached, possibly a few seconds stale).
    pub quantity: i64,
}

/// Serve the cached availability count for the `basic` tier.
pub async fn get_available_tickets(
    State(state): State<TicketApiState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<TicketAvailabilityResponse>, AppError> {
    let (Some(event_id), Some(admission_token)) = (
        params.event_id.filter(|id| !id.is_empty()),
        params.admission_token.filter(|token| !token.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "Missing eventId or admission_token parameter",
        ));
    };
    let event_id = EventId::new(event_id);

    validate_admission(&admission_token, state.jwt_secret.as_bytes(), &event_id).map_err(
        |err| {
            tracing::info!(event_id = %event_id, error = %err, "admission token rejected");
            AppError::unauthorized("Invalid admission token")
        },
    )?;

    let quantity = state.reservations.available(&event_id, BASIC_TIER).await?;

    Ok(Json(TicketAvailabilityResponse {
        event_id: event_id.as_str().to_owned(),
        available_tickets: vec![TicketAvailabilityEntry {
            ticket_type: BASIC_TIER.to_owned(),
            quantity,
        }],
    }))
}
