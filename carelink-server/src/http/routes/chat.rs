//! Chat assistant endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use carelink_core::validation::ValidationError;

use crate::assistant::{Action, CallContext, DEFAULT_SESSION};
use crate::http::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub clear_history: bool,
    pub session_id: Option<String>,
    /// Number or numeric string; anything else is ignored.
    pub patient_id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

fn patient_context(raw: Option<&Value>) -> CallContext {
    let patient_id = match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .and_then(|id| i32::try_from(id).ok());
    CallContext { patient_id }
}

/// POST /chat/gemini
async fn chat(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = req
        .session_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SESSION);

    if req.clear_history {
        if let Some(assistant) = &state.assistant {
            assistant.clear(session_id);
        }
        return Ok(Json(ChatResponse {
            reply: "Chat history cleared".into(),
            actions: Vec::new(),
        }));
    }

    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or(ValidationError::Rule {
            message: "Message is required",
        })?;

    let assistant = state
        .assistant
        .as_ref()
        .ok_or(ApiError::Unavailable("Chat is not configured"))?;

    let outcome = assistant
        .chat(session_id, &message, patient_context(req.patient_id.as_ref()))
        .await?;

    Ok(Json(ChatResponse {
        reply: outcome.reply,
        actions: outcome.actions,
    }))
}

/// Chat routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat/gemini", post(chat))
}
