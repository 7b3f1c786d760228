//! API error type with IntoResponse
//!
//! Every error renders as `{"error": "<message>"}` with a matching status.
//! Database and internal failures are logged and replaced by a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use carelink_core::ValidationError;

use crate::assistant::AssistantError;
use crate::db::repos::DbError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Request failed validation (400)
    Validation(ValidationError),

    /// Malformed request (400)
    BadRequest(String),

    /// Missing or bad credentials (401)
    Unauthorized(&'static str),

    /// Authenticated but not allowed (403)
    Forbidden(&'static str),

    /// Resource not found (404)
    NotFound(String),

    /// Constraint conflict (409)
    Conflict(String),

    /// Upstream chat model failed (502)
    BadGateway(String),

    /// Optional service not configured (503)
    Unavailable(&'static str),

    /// Database error (500, logged)
    Database(DbError),

    /// Internal error (500, logged)
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Validation(e) => e.to_string(),
            Self::BadRequest(m) | Self::NotFound(m) | Self::Conflict(m) | Self::BadGateway(m) => m,
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::Unavailable(m) => m.to_string(),
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!("Database error: {}", e);
                "An internal error occurred".to_string()
            }
            Self::Internal(m) => {
                tracing::error!("Internal error: {}", m);
                "An internal error occurred".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

/// Human name for a repository resource key.
fn display_name(resource: &str) -> String {
    match resource {
        "faq" => "FAQ".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, .. } => Self::NotFound(format!("{} not found", display_name(resource))),
            DbError::Duplicate { constraint } => {
                tracing::debug!(%constraint, "unique violation");
                Self::Conflict("Resource already exists".into())
            }
            DbError::Referenced { constraint } => {
                tracing::debug!(%constraint, "foreign key violation");
                Self::Conflict("Resource is referenced by other records".into())
            }
            DbError::Sqlx(_) => Self::Database(e),
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        Self::BadGateway(format!("Chat model error: {e}"))
    }
}
