//! Live-game rooms.
//!
//! Each session id maps to a broadcast channel; WebSocket connections
//! subscribe to it and receive join/leave and turn-result events as JSON.
//! Rooms exist independently of session workers, so spectators can connect
//! before the first start.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::http::AppState;
use crate::session::TurnResult;

/// Event fanned out to every connection in a room.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    Join { connections: usize },
    Leave { connections: usize },
    TurnResult { result: TurnResult },
}

/// Broadcast channels keyed by session id, created on first use and dropped
/// once the last connection leaves.
pub struct RoomHub {
    rooms: Mutex<HashMap<String, broadcast::Sender<RoomEvent>>>,
    buffer: usize,
}

impl RoomHub {
    pub fn new(buffer: usize) -> Self {
        RoomHub {
            rooms: Mutex::new(HashMap::new()),
            buffer,
        }
    }

    /// Sender for a room, creating the room if needed.
    pub fn channel(&self, room: &str) -> broadcast::Sender<RoomEvent> {
        let mut rooms = self.rooms.lock();
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }

    /// Fan an event out to the room. Returns how many connections got it.
    pub fn publish(&self, room: &str, event: RoomEvent) -> usize {
        let sender = {
            let rooms = self.rooms.lock();
            match rooms.get(room) {
                Some(sender) => sender.clone(),
                None => return 0,
            }
        };
        sender.send(event).unwrap_or(0)
    }

    pub fn connections(&self, room: &str) -> usize {
        self.rooms
            .lock()
            .get(room)
            .map_or(0, |sender| sender.receiver_count())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Broadcast a departure and drop the room if nobody is left.
    pub fn leave(&self, room: &str) {
        let connections = self.connections(room);
        self.publish(room, RoomEvent::Leave { connections });
        let mut rooms = self.rooms.lock();
        if let Some(sender) = rooms.get(room) {
            if sender.receiver_count() == 0 {
                rooms.remove(room);
            }
        }
    }
}

// ─── WebSocket endpoint ────────────────────────────────────────────────────

pub async fn room_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| room_connection(state, session_id, socket))
}

async fn room_connection(state: AppState, session_id: String, socket: WebSocket) {
    let mut events = state.rooms.channel(&session_id).subscribe();
    tracing::debug!(session_id = %session_id, "room connection opened");
    state.rooms.publish(
        &session_id,
        RoomEvent::Join {
            connections: state.rooms.connections(&session_id),
        },
    );

    let (mut sink, mut stream) = socket.split();

    // Room events out to the socket.
    let mut forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "room subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(_) => continue,
            };
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are only watched for the close.
    let mut inbound = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }

    state.rooms.leave(&session_id);
    tracing::debug!(session_id = %session_id, "room connection closed");
}
