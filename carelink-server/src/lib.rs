//! carelink-server: care records over HTTP, patient display sync and a
//! caregiver chat assistant.
//!
//! The binary in `carelink-cli` wires these together; everything here is
//! usable on its own given a `PgPool`.

pub mod assistant;
pub mod auth;
pub mod db;
pub mod http;
pub mod realtime;
pub mod state;

pub use auth::{AuthError, AuthKeys};
pub use db::DbError;
pub use http::{build_router, run_server, ApiError, ServerConfig, ServerError};
pub use realtime::RealtimeHub;
pub use state::AppState;
