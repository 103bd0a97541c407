//! Router assembly for the three HTTP services.

use crate::api::control::{self, ControlState};
use crate::api::{availability, reserve, webhooks, TicketApiState};
use crate::waiting_room::{self, WaitingRoomState};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let allow_origin = if allowed_origin == "*" {
        AllowOrigin::any()
    } else {
        allowed_origin
            .parse::<HeaderValue>()
            .map(AllowOrigin::exact)
            .unwrap_or_else(|_| AllowOrigin::any())
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Waiting-room service: the queue stream plus liveness.
pub fn waiting_room_router(state: WaitingRoomState) -> Router {
    Router::new()
        .route("/ws", get(waiting_room::join_waiting_room))
        .route("/health", get(health))
        .with_state(state)
}

/// Ticket API service: reservation, availability and the payment webhooks,
/// CORS-wrapped for the browser-facing endpoints.
pub fn ticket_api_router(state: TicketApiState, allowed_origin: &str) -> Router {
    Router::new()
        .route("/reserve-tickets", post(reserve::reserve_tickets))
        .route(
            "/get-available-tickets",
            get(availability::get_available_tickets),
        )
        .route("/webhooks/payment-success", get(webhooks::payment_success))
        .route("/webhooks/payment-cancel", get(webhooks::payment_cancel))
        .route("/health", get(health))
        .layer(cors_layer(allowed_origin))
        .with_state(state)
}

/// Operator control service.
pub fn control_router(state: ControlState) -> Router {
    Router::new()
        .route("/api/state", get(control::queue_state))
        .route("/api/add", post(control::add_entries))
        .route("/api/remove", post(control::remove_entries))
        .route("/api/clear", post(control::clear_queue))
        .route("/ws", get(control::monitor_queue))
        .route("/health", get(health))
        .with_state(state)
}
