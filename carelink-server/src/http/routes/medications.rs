//! Medication endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::timestamp;
use carelink_core::validation::{require, require_text};

use super::tasks::PatientFilter;
use crate::db::repos::{Medication, MedicationChanges, MedicationRepo, NewMedication, PatientRepo, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMedicationRequest {
    pub patient_id: Option<i32>,
    pub name: Option<String>,
    pub dose: Option<String>,
    pub schedule_text: Option<String>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub end_date: Option<NaiveDateTime>,
    pub prescriber_id: Option<i32>,
    pub active: Option<bool>,
}

async fn ensure_prescriber(state: &AppState, prescriber_id: Option<i32>) -> Result<(), ApiError> {
    if let Some(uid) = prescriber_id {
        if !UserRepo::new(&state.pool).exists(uid).await? {
            return Err(ApiError::not_found("Prescriber not found"));
        }
    }
    Ok(())
}

async fn create_medication(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateMedicationRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let patient_id = require(req.patient_id, "patient_id")?;
    let name = require_text(req.name, "name")?;

    if !PatientRepo::new(&state.pool).exists(patient_id).await? {
        return Err(ApiError::not_found("Patient not found"));
    }
    ensure_prescriber(&state, req.prescriber_id).await?;

    let med = MedicationRepo::new(&state.pool)
        .create(NewMedication {
            patient_id,
            name,
            dose: req.dose,
            schedule_text: req.schedule_text,
            start_date: req.start_date,
            end_date: req.end_date,
            prescriber_id: req.prescriber_id,
            active: req.active.unwrap_or(true),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Medication created", "mid": med.mid })),
    ))
}

async fn list_medications(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<PatientFilter>,
) -> Result<Json<Vec<Medication>>, ApiError> {
    Ok(Json(MedicationRepo::new(&state.pool).list(filter.patient_id).await?))
}

async fn get_medication(State(state): State<Arc<AppState>>, IdPath(mid): IdPath) -> Result<Json<Medication>, ApiError> {
    Ok(Json(MedicationRepo::new(&state.pool).get(mid).await?))
}

async fn update_medication(
    State(state): State<Arc<AppState>>,
    IdPath(mid): IdPath,
    JsonBody(changes): JsonBody<MedicationChanges>,
) -> Result<Json<Value>, ApiError> {
    ensure_prescriber(&state, changes.new_prescriber()).await?;
    MedicationRepo::new(&state.pool).update(mid, changes).await?;
    Ok(Json(json!({ "message": "Medication updated" })))
}

async fn delete_medication(State(state): State<Arc<AppState>>, IdPath(mid): IdPath) -> Result<Json<Value>, ApiError> {
    MedicationRepo::new(&state.pool).delete(mid).await?;
    Ok(Json(json!({ "message": "Medication deleted" })))
}

/// Medication routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/medications", get(list_medications).post(create_medication))
        .route("/medications/", get(list_medications).post(create_medication))
        .route(
            "/medications/{mid}",
            get(get_medication).put(update_medication).delete(delete_medication),
        )
}
