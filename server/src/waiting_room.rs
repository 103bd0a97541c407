//! The waiting-room stream: one WebSocket per queued client.
//!
//! A client joins with `GET /ws?eventId=<id>` carrying a session
//! credential. The server inserts the client into the event's queue, then
//! runs two cooperating tasks over the socket:
//!
//! - an **update ticker** sending a queue update immediately and then on
//!   every interval
//! - an **inbound reader** echoing client frames (keepalive and a future
//!   extension point)
//!
//! Either task ending tears down the other, and the queue entry is removed
//! on every exit path (including task panic) so a dead stream never
//! occupies a queue slot.
//!
//! A client is released when its 0-based rank drops below the admit batch,
//! or when its entry has vanished after a successful join (the release
//! scheduler popped it). Release means: mint the admission credential,
//! send it in one final update, follow with a normal-closure frame and
//! force-close without waiting for the client.

use crate::error::AppError;
use crate::extractors::{JwtSecretProvider, SessionUser};
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use turnstile_core::token::mint_admission;
use turnstile_core::{EventId, UserId};
use turnstile_queue::QueueStore;

/// Seconds of estimated wait attributed to each queue position.
const WAIT_SECONDS_PER_POSITION: u64 = 30;

/// Dependencies of the waiting-room service.
#[derive(Clone)]
pub struct WaitingRoomState {
    /// The queue store.
    pub queue: Arc<dyn QueueStore>,
    /// Shared credential-signing secret.
    pub jwt_secret: Arc<String>,
    /// Interval between updates on each stream.
    pub update_interval: Duration,
    /// Clients ranked below this are admitted; 1 = strict FIFO.
    pub admit_batch: u64,
}

impl JwtSecretProvider for WaitingRoomState {
    fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// Queue update pushed to the client, camelCase on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUpdate {
    /// Rough wait estimate in seconds: `positionInQueue * 30`.
    pub estimated_wait_time: u64,
    /// 1-based position.
    pub position_in_queue: u64,
    /// Clients ahead (0-based rank).
    pub people_ahead_in_queue: u64,
    /// Total clients queued for the event.
    pub total_people_in_queue: u64,
    /// Admission credential; empty until the client is released.
    pub accepted_token_id: String,
}

/// Query parameters of the `/ws` upgrade.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Event whose queue to join.
    #[serde(rename = "eventId")]
    event_id: Option<String>,
}

/// `GET /ws?eventId=`: authenticate, then upgrade into a queue stream.
pub async fn join_waiting_room(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    session: SessionUser,
    State(state): State<WaitingRoomState>,
) -> Result<Response, AppError> {
    let event_id = params
        .event_id
        .filter(|id| !id.is_empty())
        .map(EventId::new)
        .ok_or_else(|| AppError::bad_request("eventId parameter is required"))?;

    tracing::info!(event_id = %event_id, user_id = %session.user_id, "waiting-room connection requested");

    Ok(ws.on_upgrade(move |socket| queue_session(socket, event_id, session.user_id, state)))
}

/// Where a client stands in the queue on a given update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Standing {
    /// 0-based rank used for the update payload.
    rank: u64,
    /// Whether this update carries the admission credential.
    released: bool,
}

/// Judge a rank observation against the admit batch.
///
/// `None` means the entry is gone although this stream joined it earlier:
/// the scheduler popped it, which is a release.
fn standing(rank: Option<u64>, admit_batch: u64) -> Standing {
    match rank {
        Some(rank) => Standing {
            rank,
            released: rank < admit_batch,
        },
        None => Standing {
            rank: 0,
            released: true,
        },
    }
}

fn build_update(at: Standing, total: u64, token: String) -> QueueUpdate {
    let position = at.rank + 1;
    QueueUpdate {
        estimated_wait_time: position * WAIT_SECONDS_PER_POSITION,
        position_in_queue: position,
        people_ahead_in_queue: at.rank,
        total_people_in_queue: total,
        accepted_token_id: token,
    }
}

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

async fn queue_session(
    socket: WebSocket,
    event_id: EventId,
    user_id: UserId,
    state: WaitingRoomState,
) {
    let member = user_id.to_string();
    #[allow(clippy::cast_sign_loss)] // wall clock is past the epoch
    let score = Utc::now().timestamp().max(0) as u64;

    if let Err(err) = state.queue.join(&event_id, &member, score).await {
        tracing::error!(event_id = %event_id, user_id = %user_id, error = %err, "failed to join queue");
        return;
    }
    tracing::info!(event_id = %event_id, user_id = %user_id, "joined waiting queue");

    let (sender, receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    let mut update_task = {
        let sender = sender.clone();
        let state = state.clone();
        let event_id = event_id.clone();
        let member = member.clone();
        tokio::spawn(async move {
            send_queue_updates(&sender, &state, &event_id, user_id, &member).await;
        })
    };

    let mut echo_task = {
        let sender = sender.clone();
        tokio::spawn(async move {
            echo_messages(receiver, &sender, user_id).await;
        })
    };

    // Either side ending (or panicking) tears down the pair.
    tokio::select! {
        _ = &mut update_task => echo_task.abort(),
        _ = &mut echo_task => update_task.abort(),
    }

    if let Err(err) = state.queue.leave(&event_id, &member).await {
        tracing::error!(event_id = %event_id, user_id = %user_id, error = %err, "failed to leave queue");
    }
    tracing::info!(event_id = %event_id, user_id = %user_id, "waiting-room stream closed");
}

/// The update ticker half of the stream.
async fn send_queue_updates(
    sender: &WsSender,
    state: &WaitingRoomState,
    event_id: &EventId,
    user_id: UserId,
    member: &str,
) {
    match send_update(sender, state, event_id, user_id, member).await {
        Ok(true) => {
            close_accepted(sender, user_id).await;
            return;
        }
        Ok(false) => {}
        Err(()) => return,
    }

    let mut ticker = interval(state.update_interval);
    ticker.tick().await; // the immediate first tick

    loop {
        ticker.tick().await;
        match send_update(sender, state, event_id, user_id, member).await {
            Ok(true) => {
                close_accepted(sender, user_id).await;
                return;
            }
            Ok(false) => {}
            Err(()) => return,
        }
    }
}

/// Compute and send one update. `Ok(true)` means the client was released
/// and the stream should close; `Err` means the stream is already dead or
/// the store failed, which aborts only this client.
async fn send_update(
    sender: &WsSender,
    state: &WaitingRoomState,
    event_id: &EventId,
    user_id: UserId,
    member: &str,
) -> Result<bool, ()> {
    let rank = match state.queue.rank(event_id, member).await {
        Ok(rank) => rank,
        Err(err) => {
            tracing::error!(event_id = %event_id, user_id = %user_id, error = %err, "failed to read queue rank");
            return Err(());
        }
    };
    let total = match state.queue.len(event_id).await {
        Ok(total) => total,
        Err(err) => {
            tracing::error!(event_id = %event_id, user_id = %user_id, error = %err, "failed to read queue size");
            return Err(());
        }
    };

    let at = standing(rank, state.admit_batch);
    let token = if at.released {
        match mint_admission(user_id, event_id, state.jwt_secret.as_bytes()) {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(event_id = %event_id, user_id = %user_id, error = %err, "failed to mint admission token");
                return Err(());
            }
        }
    } else {
        String::new()
    };

    let update = build_update(at, total, token);
    let Ok(json) = serde_json::to_string(&update) else {
        return Err(());
    };

    if sender.lock().await.send(Message::Text(json)).await.is_err() {
        tracing::debug!(user_id = %user_id, "client gone before update");
        return Err(());
    }

    Ok(at.released)
}

/// Send the polite close frame; the force-close happens when the socket
/// halves drop on task teardown.
async fn close_accepted(sender: &WsSender, user_id: UserId) {
    tracing::info!(user_id = %user_id, "client released with admission token, closing");
    let _ = sender
        .lock()
        .await
        .send(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: Cow::from("accepted"),
        })))
        .await;
}

/// The inbound-reader half: echo frames back until the client goes away.
async fn echo_messages(mut receiver: SplitStream<WebSocket>, sender: &WsSender, user_id: UserId) {
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(message @ (Message::Text(_) | Message::Binary(_))) => {
                if sender.lock().await.send(message).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(user_id = %user_id, "client requested close");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(err) => {
                tracing::debug!(user_id = %user_id, error = %err, "read error on client stream");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_fifo_releases_only_the_head() {
        assert!(standing(Some(0), 1).released);
        assert!(!standing(Some(1), 1).released);
        assert!(!standing(Some(9), 1).released);
    }

    #[test]
    fn batched_admission_releases_the_front_batch() {
        assert!(standing(Some(49), 50).released);
        assert!(!standing(Some(50), 50).released);
    }

    #[test]
    fn popped_entry_counts_as_released() {
        let at = standing(None, 1);
        assert!(at.released);
        assert_eq!(at.rank, 0);
    }

    #[test]
    fn update_payload_matches_the_wire_contract() {
        let update = build_update(standing(Some(4), 1), 12, String::new());
        assert_eq!(update.position_in_queue, 5);
        assert_eq!(update.people_ahead_in_queue, 4);
        assert_eq!(update.estimated_wait_time, 150);
        assert_eq!(update.total_people_in_queue, 12);

        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "estimatedWaitTime": 150,
                "positionInQueue": 5,
                "peopleAheadInQueue": 4,
                "totalPeopleInQueue": 12,
                "acceptedTokenId": "",
            })
        );
    }

    #[test]
    fn released_update_carries_the_token() {
        let update = build_update(standing(Some(0), 1), 3, "tok".into());
        assert_eq!(update.accepted_token_id, "tok");
        assert_eq!(update.position_in_queue, 1);
        assert_eq!(update.estimated_wait_time, 30);
    }
}
