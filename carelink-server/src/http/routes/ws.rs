//! WebSocket endpoint for realtime events

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::realtime::ws_handler;
use crate::state::AppState;

/// GET /ws
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::test_support::{call, lazy_state};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn plain_get_is_not_upgraded() {
        let app = router().with_state(lazy_state());
        let (status, _) = call(app, Method::GET, "/ws", None).await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::NOT_FOUND);
    }
}
