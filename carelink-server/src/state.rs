//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use crate::assistant::Assistant;
use crate::auth::AuthKeys;
use crate::realtime::RealtimeHub;

/// Shared application state, handed to handlers as `State<Arc<AppState>>`
pub struct AppState {
    pub pool: PgPool,
    pub hub: RealtimeHub,
    pub auth: AuthKeys,
    /// `None` when no chat API key is configured
    pub assistant: Option<Arc<Assistant>>,
}

impl AppState {
    pub fn new(pool: PgPool, hub: RealtimeHub, auth: AuthKeys) -> Self {
        Self {
            pool,
            hub,
            auth,
            assistant: None,
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<Assistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }
}
