//! Signup and login

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use carelink_core::validation::require_text;

use crate::auth::{hash_password, verify_password};
use crate::db::repos::{DbError, NewUser, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public view of a user
#[derive(Debug, Serialize)]
pub struct UserView {
    pub uid: i32,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            uid: u.uid,
            email: u.email,
            name: u.name,
            phone: u.phone,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub access_token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserView,
}

const EMAIL_TAKEN: &str = "Email already registered";
const INVALID_LOGIN: &str = "Invalid email or password";

/// POST /auth/signup
async fn signup(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let email = require_text(req.email, "email")?.trim().to_string();
    let password = require_text(req.password, "password")?;
    let name = require_text(req.name, "name")?;

    let users = UserRepo::new(&state.pool);
    if users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
    }

    let password_hash = hash_password(&password)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let user = users
        .create(NewUser {
            email,
            password_hash,
            name,
            phone: req.phone,
        })
        .await
        .map_err(|e| match e {
            DbError::Duplicate { .. } => ApiError::Conflict(EMAIL_TAKEN.into()),
            other => other.into(),
        })?;

    let access_token = state.auth.issue(user.uid).map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::info!(uid = user.uid, "user signed up");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully",
            access_token,
            user: user.into(),
        }),
    ))
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (email, password) = match (req.email, req.password) {
        (Some(e), Some(p)) if !e.trim().is_empty() && !p.is_empty() => (e, p),
        _ => return Err(ApiError::BadRequest("Email and password are required".into())),
    };

    let user = UserRepo::new(&state.pool)
        .find_by_email(email.trim())
        .await?
        .ok_or(ApiError::Unauthorized(INVALID_LOGIN))?;
    if !verify_password(&password, &user.password_hash).await {
        return Err(ApiError::Unauthorized(INVALID_LOGIN));
    }

    if !user.active {
        return Err(ApiError::Forbidden("Account is deactivated"));
    }

    let access_token = state.auth.issue(user.uid).map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::info!(uid = user.uid, "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        user: user.into(),
    }))
}

/// Auth routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::test_support::{call, lazy_state};
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn signup_reports_first_missing_field() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::POST, "/auth/signup", Some(json!({"email": "a@b.c"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: password");
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::POST, "/auth/login", Some(json!({"email": "a@b.c", "password": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email and password are required");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::POST, "/auth/login", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn signup_then_login() {
        let state = crate::http::routes::test_support::db_state().await;
        let email = format!("carer-{}@example.com", chrono::Utc::now().timestamp_micros());

        let app = router().with_state(state.clone());
        let (status, body) = call(
            app,
            Method::POST,
            "/auth/signup",
            Some(json!({"email": email, "password": "pw", "name": "Sam"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully");

        let app = router().with_state(state.clone());
        let (status, _) = call(app, Method::POST, "/auth/signup", Some(json!({"email": email, "password": "x", "name": "Dup"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let app = router().with_state(state.clone());
        let (status, body) = call(app, Method::POST, "/auth/login", Some(json!({"email": email, "password": "pw"}))).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap();
        assert_eq!(state.auth.verify(token).unwrap(), body["user"]["uid"].as_i64().unwrap() as i32);

        let app = router().with_state(state);
        let (status, body) = call(app, Method::POST, "/auth/login", Some(json!({"email": email, "password": "nope"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }
}
