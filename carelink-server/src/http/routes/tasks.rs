//! Task endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::validation::{require, require_text};
use carelink_core::{timestamp, Priority, TaskStatus};

use crate::db::repos::{NewTask, PatientRepo, Task, TaskChanges, TaskRepo, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub patient_id: Option<i32>,
    pub caretaker_id: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub due_at: Option<NaiveDateTime>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub active: Option<bool>,
}

/// `?patient_id=` filter shared by the per-patient list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct PatientFilter {
    pub patient_id: Option<i32>,
}

/// POST /tasks
async fn create_task(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let patient_id = require(req.patient_id, "patient_id")?;
    let caretaker_id = require(req.caretaker_id, "caretaker_id")?;
    let title = require_text(req.title, "title")?;

    let patient_known = PatientRepo::new(&state.pool).exists(patient_id).await?;
    let caretaker_known = UserRepo::new(&state.pool).exists(caretaker_id).await?;
    if !patient_known || !caretaker_known {
        return Err(ApiError::not_found("Patient or caretaker not found"));
    }

    let task = TaskRepo::new(&state.pool)
        .create(NewTask {
            patient_id,
            caretaker_id,
            title,
            description: req.description,
            due_at: req.due_at,
            status: req.status.as_deref().and_then(TaskStatus::parse).unwrap_or_default(),
            priority: req.priority.as_deref().and_then(Priority::parse).unwrap_or_default(),
            active: req.active.unwrap_or(true),
        })
        .await?;

    tracing::info!(tid = task.tid, patient_id, "task created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Task created", "tid": task.tid })),
    ))
}

/// GET /tasks?patient_id=
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<PatientFilter>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(TaskRepo::new(&state.pool).list(filter.patient_id).await?))
}

/// GET /tasks/{tid}
async fn get_task(State(state): State<Arc<AppState>>, IdPath(tid): IdPath) -> Result<Json<Task>, ApiError> {
    Ok(Json(TaskRepo::new(&state.pool).get(tid).await?))
}

/// PUT /tasks/{tid}
async fn update_task(
    State(state): State<Arc<AppState>>,
    IdPath(tid): IdPath,
    JsonBody(changes): JsonBody<TaskChanges>,
) -> Result<Json<Value>, ApiError> {
    TaskRepo::new(&state.pool).update(tid, changes).await?;
    Ok(Json(json!({ "message": "Task updated" })))
}

/// DELETE /tasks/{tid}
async fn delete_task(State(state): State<Arc<AppState>>, IdPath(tid): IdPath) -> Result<Json<Value>, ApiError> {
    TaskRepo::new(&state.pool).delete(tid).await?;
    Ok(Json(json!({ "message": "Task deleted" })))
}

/// Task routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/", get(list_tasks).post(create_task))
        .route("/tasks/{tid}", get(get_task).put(update_task).delete(delete_task))
}
