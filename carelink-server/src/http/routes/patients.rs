//! Patient endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::validation::{require, require_text};

use crate::db::repos::{NewPatient, Patient, PatientChanges, PatientRepo, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub caretaker_id: Option<i32>,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub medical_summary: Option<String>,
    pub emergency_contact: Option<String>,
    pub active: Option<bool>,
}

/// POST /patients
async fn create_patient(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let caretaker_id = require(req.caretaker_id, "caretaker_id")?;
    let name = require_text(req.name, "name")?;

    if !UserRepo::new(&state.pool).exists(caretaker_id).await? {
        return Err(ApiError::not_found("Caretaker not found"));
    }

    let patient = PatientRepo::new(&state.pool)
        .create(NewPatient {
            caretaker_id,
            name,
            age: req.age,
            gender: req.gender,
            medical_summary: req.medical_summary,
            emergency_contact: req.emergency_contact,
            active: req.active.unwrap_or(true),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Patient created", "pid": patient.pid })),
    ))
}

/// GET /patients
async fn list_patients(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Patient>>, ApiError> {
    Ok(Json(PatientRepo::new(&state.pool).list().await?))
}

/// GET /patients/{pid}
async fn get_patient(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Patient>, ApiError> {
    Ok(Json(PatientRepo::new(&state.pool).get(pid).await?))
}

/// PUT /patients/{pid}
async fn update_patient(
    State(state): State<Arc<AppState>>,
    IdPath(pid): IdPath,
    JsonBody(changes): JsonBody<PatientChanges>,
) -> Result<Json<Value>, ApiError> {
    PatientRepo::new(&state.pool).update(pid, changes).await?;
    Ok(Json(json!({ "message": "Patient updated" })))
}

/// DELETE /patients/{pid}
async fn delete_patient(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Value>, ApiError> {
    PatientRepo::new(&state.pool).delete(pid).await?;
    Ok(Json(json!({ "message": "Patient deleted" })))
}

/// Patient routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/patients", get(list_patients).post(create_patient))
        .route("/patients/", get(list_patients).post(create_patient))
        .route(
            "/patients/{pid}",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
}
