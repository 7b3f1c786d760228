//! Realtime push to caregiver dashboards and patient displays
//!
//! HTTP handlers publish through [`RealtimeHub`]; every open WebSocket
//! subscribes to the hub and forwards the events addressed to rooms it has
//! joined, plus all broadcasts.

pub mod hub;
pub mod socket;

pub use hub::{Envelope, RealtimeHub};
pub use socket::ws_handler;
