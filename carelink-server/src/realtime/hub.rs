//! In-process event hub backed by a tokio broadcast channel

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Events buffered per subscriber before it starts lagging.
const DEFAULT_CAPACITY: usize = 256;

/// One published event
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub event: &'static str,
    /// Target room; `None` reaches every connection.
    #[serde(skip)]
    pub room: Option<String>,
    pub data: Value,
}

impl Envelope {
    pub fn to_room(room: impl Into<String>, event: &'static str, data: Value) -> Self {
        Self {
            event,
            room: Some(room.into()),
            data,
        }
    }

    pub fn to_all(event: &'static str, data: Value) -> Self {
        Self {
            event,
            room: None,
            data,
        }
    }
}

/// Fan-out point for realtime events
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<Envelope>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn emit_to(&self, room: impl Into<String>, event: &'static str, data: Value) {
        self.publish(Envelope::to_room(room, event, data));
    }

    pub fn broadcast(&self, event: &'static str, data: Value) {
        self.publish(Envelope::to_all(event, data));
    }

    /// Publishing with nobody listening is normal (no open displays).
    fn publish(&self, envelope: Envelope) {
        let room = envelope.room.clone();
        match self.tx.send(envelope) {
            Ok(receivers) => tracing::debug!(?room, receivers, "event published"),
            Err(_) => tracing::trace!(?room, "event dropped, no subscribers"),
        }
    }
}
