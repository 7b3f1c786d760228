//! WebSocket endpoint
//!
//! Frames in both directions are JSON `{"event": ..., "data": ...}`.
//! A connection starts in no rooms; it receives broadcasts immediately and
//! room events once it has joined that room.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;

use carelink_core::events;

use super::hub::Envelope;
use crate::state::AppState;

/// Client → server frame
#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Rooms joined by one connection.
///
/// Kept apart from the socket loop so join handling and filtering can be
/// tested without a live connection.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRooms {
    rooms: HashSet<String>,
}

impl ConnectionRooms {
    /// Whether this connection should receive `envelope`.
    pub(crate) fn accepts(&self, envelope: &Envelope) -> bool {
        match &envelope.room {
            None => true,
            Some(room) => self.rooms.contains(room),
        }
    }

    /// Handle a text frame; returns the acknowledgement to send back, if any.
    pub(crate) fn handle_frame(&mut self, text: &str) -> Option<Envelope> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unparseable frame");
                return None;
            }
        };

        let (key, room) = match frame.event.as_str() {
            "join_patient_room" => {
                let id = id_field(&frame.data, "patient_id")?;
                ("patient_id", events::patient_room(id))
            }
            "join_caregiver_room" => {
                let id = id_field(&frame.data, "caregiver_id")?;
                ("caregiver_id", events::caregiver_room(id))
            }
            other => {
                tracing::debug!(event = other, "ignoring unknown frame");
                return None;
            }
        };

        tracing::info!(%room, "connection joined room");
        self.rooms.insert(room.clone());
        Some(Envelope::to_room(
            room.clone(),
            events::ROOM_JOINED,
            json!({ "room": room, key: frame.data[key] }),
        ))
    }
}

/// Accepts `7` or `"7"`.
fn id_field(data: &Value, key: &str) -> Option<i32> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.hub.subscribe();
    let mut rooms = ConnectionRooms::default();
    tracing::debug!("websocket connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "websocket receive failed");
                        break;
                    }
                };
                if let Some(ack) = rooms.handle_frame(text.as_str()) {
                    if send(&mut socket, &ack).await.is_err() {
                        break;
                    }
                }
            }
            published = rx.recv() => {
                match published {
                    Ok(envelope) if rooms.accepts(&envelope) => {
                        if send(&mut socket, &envelope).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket lagging, events skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("websocket disconnected");
}

async fn send(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(envelope) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, event = envelope.event, "failed to encode event");
            return Ok(());
        }
    };
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_patient_room_and_acks() {
        let mut rooms = ConnectionRooms::default();
        let ack = rooms
            .handle_frame(r#"{"event":"join_patient_room","data":{"patient_id":4}}"#)
            .expect("ack");

        assert_eq!(ack.event, events::ROOM_JOINED);
        assert_eq!(ack.data, json!({"room": "patient_4", "patient_id": 4}));
        assert!(rooms.accepts(&Envelope::to_room("patient_4", events::FAQS_UPDATED, json!({}))));
        assert!(!rooms.accepts(&Envelope::to_room("patient_5", events::FAQS_UPDATED, json!({}))));
    }

    #[test]
    fn caregiver_id_may_be_a_string() {
        let mut rooms = ConnectionRooms::default();
        let ack = rooms
            .handle_frame(r#"{"event":"join_caregiver_room","data":{"caregiver_id":"12"}}"#)
            .expect("ack");
        assert_eq!(ack.data["room"], "caregiver_12");
        assert!(rooms.accepts(&Envelope::to_room("caregiver_12", events::PATIENT_ALERT, json!({}))));
    }

    #[test]
    fn broadcasts_reach_every_connection() {
        let rooms = ConnectionRooms::default();
        assert!(rooms.accepts(&Envelope::to_all(events::EMERGENCY_ALERT, json!({}))));
    }

    #[test]
    fn junk_frames_are_ignored() {
        let mut rooms = ConnectionRooms::default();
        assert!(rooms.handle_frame("not json").is_none());
        assert!(rooms.handle_frame(r#"{"event":"dance"}"#).is_none());
        assert!(rooms.handle_frame(r#"{"event":"join_patient_room","data":{}}"#).is_none());
        assert!(rooms
            .handle_frame(r#"{"event":"join_patient_room","data":{"patient_id":true}}"#)
            .is_none());
    }
}
