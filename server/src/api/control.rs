//! Operator control of an event queue, for load testing and incident
//! response. Runs as its own unauthenticated service.

use crate::error::AppError;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use turnstile_core::EventId;
use turnstile_queue::{QueueError, QueueStore};

/// How often the monitoring stream pushes the queue state.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Dependencies of the operator control service.
#[derive(Clone)]
pub struct ControlState {
    /// The queue store under inspection.
    pub queue: Arc<dyn QueueStore>,
}

/// Snapshot of one event's queue, camelCase on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStateView {
    /// Event inspected.
    pub event_id: String,
    /// Members queued.
    pub total_in_queue: usize,
    /// Members in queue order.
    pub user_ids: Vec<String>,
}

/// Body of `POST /api/add` and `POST /api/remove`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateQueueRequest {
    /// Event whose queue to mutate.
    pub event_id: String,
    /// Entries to add or remove.
    pub count: u64,
}

/// Query parameter naming the event under inspection.
#[derive(Debug, Deserialize)]
pub struct EventParams {
    /// Event whose queue to inspect.
    #[serde(rename = "eventId")]
    event_id: Option<String>,
}

fn require_event(params: EventParams) -> Result<EventId, AppError> {
    params
        .event_id
        .filter(|id| !id.is_empty())
        .map(EventId::new)
        .ok_or_else(|| AppError::bad_request("eventId parameter is required"))
}

async fn snapshot(queue: &dyn QueueStore, event_id: &EventId) -> Result<QueueStateView, QueueError> {
    let user_ids = queue.members(event_id).await?;
    Ok(QueueStateView {
        event_id: event_id.as_str().to_owned(),
        total_in_queue: user_ids.len(),
        user_ids,
    })
}

fn store_error(err: QueueError) -> AppError {
    AppError::internal("queue store unavailable").with_source(anyhow::Error::new(err))
}

/// `GET /api/state?eventId=`
pub async fn queue_state(
    State(state): State<ControlState>,
    Query(params): Query<EventParams>,
) -> Result<Json<QueueStateView>, AppError> {
    let event_id = require_event(params)?;
    let view = snapshot(state.queue.as_ref(), &event_id)
        .await
        .map_err(store_error)?;
    Ok(Json(view))
}

/// `POST /api/add`: insert `count` synthetic entries.
///
/// The entries are indistinguishable from real clients to the scheduler
/// and the position math.
pub async fn add_entries(
    State(state): State<ControlState>,
    body: String,
) -> Result<Json<QueueStateView>, AppError> {
    let request: MutateQueueRequest =
        serde_json::from_str(&body).map_err(|_| AppError::bad_request("Invalid request body"))?;
    if request.event_id.is_empty() || request.count == 0 {
        return Err(AppError::bad_request("Invalid request"));
    }
    let event_id = EventId::new(request.event_id);

    state
        .queue
        .add_synthetic(&event_id, request.count)
        .await
        .map_err(store_error)?;
    tracing::info!(event_id = %event_id, count = request.count, "added synthetic queue entries");

    let view = snapshot(state.queue.as_ref(), &event_id)
        .await
        .map_err(store_error)?;
    Ok(Json(view))
}

/// `POST /api/remove`: pop the `count` front-most entries.
pub async fn remove_entries(
    State(state): State<ControlState>,
    body: String,
) -> Result<Json<QueueStateView>, AppError> {
    let request: MutateQueueRequest =
        serde_json::from_str(&body).map_err(|_| AppError::bad_request("Invalid request body"))?;
    if request.event_id.is_empty() || request.count == 0 {
        return Err(AppError::bad_request("Invalid request"));
    }
    let event_id = EventId::new(request.event_id);

    let removed = state
        .queue
        .pop_front(&event_id, request.count)
        .await
        .map_err(store_error)?;
    tracing::info!(event_id = %event_id, removed = removed.len(), "removed queue entries");

    let view = snapshot(state.queue.as_ref(), &event_id)
        .await
        .map_err(store_error)?;
    Ok(Json(view))
}

/// `POST /api/clear?eventId=`: delete the queue.
pub async fn clear_queue(
    State(state): State<ControlState>,
    Query(params): Query<EventParams>,
) -> Result<Json<QueueStateView>, AppError> {
    let event_id = require_event(params)?;
    state.queue.clear(&event_id).await.map_err(store_error)?;
    tracing::info!(event_id = %event_id, "cleared queue");

    let view = snapshot(state.queue.as_ref(), &event_id)
        .await
        .map_err(store_error)?;
    Ok(Json(view))
}

/// `GET /ws?eventId=`: push the queue state every second.
pub async fn monitor_queue(
    ws: WebSocketUpgrade,
    Query(params): Query<EventParams>,
    State(state): State<ControlState>,
) -> Result<Response, AppError> {
    let event_id = require_event(params)?;
    Ok(ws.on_upgrade(move |socket| monitor_session(socket, event_id, state)))
}

async fn monitor_session(mut socket: WebSocket, event_id: EventId, state: ControlState) {
    tracing::info!(event_id = %event_id, "queue monitor connected");
    let mut ticker = interval(MONITOR_INTERVAL);

    loop {
        ticker.tick().await;
        let view = match snapshot(state.queue.as_ref(), &event_id).await {
            Ok(view) => view,
            Err(err) => {
                tracing::error!(event_id = %event_id, error = %err, "failed to read queue state");
                break;
            }
        };
        let Ok(json) = serde_json::to_string(&view) else {
            break;
        };
        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }
    }

    tracing::info!(event_id = %event_id, "queue monitor disconnected");
}
