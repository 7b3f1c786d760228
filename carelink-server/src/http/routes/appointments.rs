//! Appointment endpoints
//!
//! Every mutation emits `schedule_updated` to the patient's room so open
//! companion displays refetch their schedule.

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::validation::{require, ValidationError};
use carelink_core::{events, timestamp};

use super::tasks::PatientFilter;
use crate::db::repos::{Appointment, AppointmentChanges, AppointmentRepo, NewAppointment, PatientRepo, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody, QueryParams};
use crate::realtime::RealtimeHub;
use crate::state::AppState;

const END_BEFORE_START: ValidationError = ValidationError::Rule {
    message: "end_time must not be before start_time",
};

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<i32>,
    pub doctor_id: Option<i32>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub end_time: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub active: Option<bool>,
}

fn schedule_changed(hub: &RealtimeHub, patient_id: i32) {
    hub.emit_to(
        events::patient_room(patient_id),
        events::SCHEDULE_UPDATED,
        json!({ "patient_id": patient_id }),
    );
}

async fn ensure_parties(state: &AppState, patient_id: Option<i32>, doctor_id: Option<i32>) -> Result<(), ApiError> {
    if let Some(pid) = patient_id {
        if !PatientRepo::new(&state.pool).exists(pid).await? {
            return Err(ApiError::not_found("Patient not found"));
        }
    }
    if let Some(uid) = doctor_id {
        if !UserRepo::new(&state.pool).exists(uid).await? {
            return Err(ApiError::not_found("Doctor not found"));
        }
    }
    Ok(())
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let patient_id = require(req.patient_id, "patient_id")?;
    let doctor_id = require(req.doctor_id, "doctor_id")?;
    let start_time = require(req.start_time, "start_time")?;
    let end_time = require(req.end_time, "end_time")?;
    if end_time < start_time {
        return Err(END_BEFORE_START.into());
    }

    ensure_parties(&state, Some(patient_id), Some(doctor_id)).await?;

    let appt = AppointmentRepo::new(&state.pool)
        .create(NewAppointment {
            patient_id,
            doctor_id,
            start_time,
            end_time,
            location: req.location,
            active: req.active.unwrap_or(true),
        })
        .await?;

    schedule_changed(&state.hub, patient_id);
    tracing::info!(aid = appt.aid, patient_id, "appointment created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Appointment created", "aid": appt.aid })),
    ))
}

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<PatientFilter>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    Ok(Json(AppointmentRepo::new(&state.pool).list(filter.patient_id).await?))
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    IdPath(aid): IdPath,
) -> Result<Json<Appointment>, ApiError> {
    Ok(Json(AppointmentRepo::new(&state.pool).get(aid).await?))
}

async fn update_appointment(
    State(state): State<Arc<AppState>>,
    IdPath(aid): IdPath,
    JsonBody(changes): JsonBody<AppointmentChanges>,
) -> Result<Json<Value>, ApiError> {
    let repo = AppointmentRepo::new(&state.pool);

    // Validate against the row as it would look after the change.
    let before = repo.get(aid).await?;
    let mut preview = before.clone();
    changes.clone().apply(&mut preview);
    if preview.ends_before_start() {
        return Err(END_BEFORE_START.into());
    }
    ensure_parties(&state, changes.patient_id, changes.doctor_id).await?;

    let after = repo.update(aid, changes).await?;

    schedule_changed(&state.hub, after.patient_id);
    if before.patient_id != after.patient_id {
        schedule_changed(&state.hub, before.patient_id);
    }
    Ok(Json(json!({ "message": "Appointment updated" })))
}

async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    IdPath(aid): IdPath,
) -> Result<Json<Value>, ApiError> {
    let removed = AppointmentRepo::new(&state.pool).delete(aid).await?;
    schedule_changed(&state.hub, removed.patient_id);
    Ok(Json(json!({ "message": "Appointment deleted" })))
}

/// Appointment routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{aid}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::patients;
    use crate::http::routes::test_support::{call, care_pair, db_state, lazy_state};
    use crate::realtime::Envelope;
    use axum::http::Method;
    use tokio::sync::broadcast::Receiver;

    fn next_schedule_room(rx: &mut Receiver<Envelope>) -> Option<String> {
        let event = rx.try_recv().ok()?;
        assert_eq!(event.event, events::SCHEDULE_UPDATED);
        event.room
    }

    #[tokio::test]
    async fn end_before_start_is_400() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(
            app,
            Method::POST,
            "/appointments",
            Some(json!({
                "patient_id": 1,
                "doctor_id": 2,
                "start_time": "2025-11-10T15:00:00",
                "end_time": "2025-11-10T14:00:00",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "end_time must not be before start_time");
    }

    #[tokio::test]
    async fn times_are_required() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(
            app,
            Method::POST,
            "/appointments/",
            Some(json!({"patient_id": 1, "doctor_id": 2, "start_time": "2025-11-10T15:00:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: end_time");
    }

    #[tokio::test]
    async fn non_numeric_patient_filter_is_json_400() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::GET, "/appointments?patient_id=", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn every_mutation_notifies_schedule_rooms() {
        let state = db_state().await;
        let (doctor, first) = care_pair(&state, "appt-a").await;
        let (_, second) = care_pair(&state, "appt-b").await;
        let mut rx = state.hub.subscribe();

        let app = router().with_state(state.clone());
        let (status, body) = call(
            app,
            Method::POST,
            "/appointments",
            Some(json!({
                "patient_id": first.pid,
                "doctor_id": doctor.uid,
                "start_time": "2025-11-10T14:00:00",
                "end_time": "2025-11-10T14:30:00",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let aid = body["aid"].as_i64().unwrap();
        assert_eq!(next_schedule_room(&mut rx), Some(events::patient_room(first.pid)));

        // Moving the appointment tells both the new and the old patient.
        let app = router().with_state(state.clone());
        let (status, _) = call(
            app,
            Method::PUT,
            &format!("/appointments/{aid}"),
            Some(json!({"patient_id": second.pid})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(next_schedule_room(&mut rx), Some(events::patient_room(second.pid)));
        assert_eq!(next_schedule_room(&mut rx), Some(events::patient_room(first.pid)));

        let app = router().with_state(state.clone());
        let (status, body) = call(
            app,
            Method::PUT,
            &format!("/appointments/{aid}"),
            Some(json!({"end_time": "2025-11-10T13:00:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "end_time must not be before start_time");
        assert!(next_schedule_room(&mut rx).is_none());

        let app = router().with_state(state);
        let (status, _) = call(app, Method::DELETE, &format!("/appointments/{aid}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(next_schedule_room(&mut rx), Some(events::patient_room(second.pid)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn patient_with_appointments_cannot_be_deleted() {
        let state = db_state().await;
        let (doctor, patient) = care_pair(&state, "appt-ref").await;
        AppointmentRepo::new(&state.pool)
            .create(NewAppointment {
                patient_id: patient.pid,
                doctor_id: doctor.uid,
                start_time: timestamp::parse("2025-11-10T09:00:00").unwrap(),
                end_time: timestamp::parse("2025-11-10T09:30:00").unwrap(),
                location: None,
                active: true,
            })
            .await
            .unwrap();

        let app = patients::router().with_state(state.clone());
        let (status, body) = call(app, Method::DELETE, &format!("/patients/{}", patient.pid), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].is_string());

        assert!(PatientRepo::new(&state.pool).exists(patient.pid).await.unwrap());
    }
}
