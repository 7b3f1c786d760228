//! Reminder endpoints
//!
//! Reminders are stored rows only; nothing here delivers them.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::timestamp;
use carelink_core::validation::require;

use crate::db::repos::{NewReminder, PatientRepo, Reminder, ReminderRepo, TaskRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    pub patient_id: Option<i32>,
    pub task_id: Option<i32>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub remind_at: Option<NaiveDateTime>,
    pub channel: Option<String>,
}

/// POST /reminders/appointment
async fn create_reminder(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateReminderRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let patient_id = require(req.patient_id, "patient_id")?;
    let task_id = require(req.task_id, "task_id")?;
    let remind_at = require(req.remind_at, "remind_at")?;

    if !PatientRepo::new(&state.pool).exists(patient_id).await? {
        return Err(ApiError::not_found("Patient not found"));
    }
    if !TaskRepo::new(&state.pool).exists(task_id).await? {
        return Err(ApiError::not_found("Task not found"));
    }

    let reminder = ReminderRepo::new(&state.pool)
        .create(NewReminder {
            patient_id,
            task_id,
            channel: req.channel,
            remind_at,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Reminder created", "reminder_id": reminder.rid })),
    ))
}

/// GET /reminders/appointment/{task_id}
async fn list_reminders(
    State(state): State<Arc<AppState>>,
    IdPath(task_id): IdPath,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    Ok(Json(ReminderRepo::new(&state.pool).list_for_task(task_id).await?))
}

/// Reminder routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reminders/appointment", post(create_reminder))
        .route("/reminders/appointment/{task_id}", get(list_reminders))
}
