//! Patient alerts raised from the companion app
//!
//! Every alert goes to the caretaker's room as `patient_alert` and is also
//! broadcast under a kind-specific event for shared dashboards.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use carelink_core::{events, timestamp};

use crate::db::repos::{PatientRepo, PatientWithCaretaker};
use crate::http::error::ApiError;
use crate::http::extractors::JsonBody;
use crate::state::AppState;

const PATIENT_ID_REQUIRED: &str = "Patient ID is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CallRequest,
    #[serde(rename = "emergency_911")]
    Emergency911,
    NavigationHelp,
}

impl AlertKind {
    /// Broadcast event name for this kind.
    fn broadcast_event(self) -> &'static str {
        match self {
            Self::CallRequest => events::NEW_ALERT,
            Self::Emergency911 => events::EMERGENCY_ALERT,
            Self::NavigationHelp => events::LOCATION_ALERT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

/// Alert payload, sent to caregivers and echoed in the response
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub patient_id: i32,
    pub patient_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caregiver_name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub timestamp: String,
    pub priority: &'static str,
}

impl Alert {
    fn new(kind: AlertKind, patient: &PatientWithCaretaker, message: String, priority: &'static str) -> Self {
        Self {
            kind,
            patient_id: patient.pid,
            patient_name: patient.patient_name.clone(),
            caregiver_name: None,
            message,
            location: None,
            timestamp: timestamp::format(&timestamp::now()),
            priority,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallCaregiverRequest {
    pub patient_id: Option<i32>,
    pub caregiver_name: Option<String>,
    pub caregiver_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub patient_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct NavigationHelpRequest {
    pub patient_id: Option<i32>,
    #[serde(default)]
    pub location: Option<Location>,
}

async fn lookup(state: &AppState, patient_id: Option<i32>) -> Result<PatientWithCaretaker, ApiError> {
    let pid = patient_id.ok_or_else(|| ApiError::BadRequest(PATIENT_ID_REQUIRED.into()))?;
    Ok(PatientRepo::new(&state.pool).with_caretaker(pid).await?)
}

/// Deliver to the caretaker room and the kind's broadcast event.
fn dispatch(state: &AppState, caretaker_id: i32, alert: &Alert) -> Result<(), ApiError> {
    let payload = serde_json::to_value(alert).map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .hub
        .emit_to(events::caregiver_room(caretaker_id), events::PATIENT_ALERT, payload.clone());
    state.hub.broadcast(alert.kind.broadcast_event(), payload);
    tracing::info!(
        patient_id = alert.patient_id,
        caretaker_id,
        kind = ?alert.kind,
        "patient alert raised"
    );
    Ok(())
}

fn respond(message: &str, alert: Alert) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "alert": alert }))
}

/// POST /patient-alerts/call-caregiver
async fn call_caregiver(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CallCaregiverRequest>,
) -> Result<Json<Value>, ApiError> {
    let patient = lookup(&state, req.patient_id).await?;

    let callee = req.caregiver_name.unwrap_or_else(|| "Caregiver".to_string());
    let phone = req.caregiver_phone.unwrap_or_else(|| "Unknown".to_string());
    let mut alert = Alert::new(
        AlertKind::CallRequest,
        &patient,
        format!("{} is calling {} ({})", patient.patient_name, callee, phone),
        "high",
    );
    alert.caregiver_name = Some(patient.caregiver_name.clone());

    dispatch(&state, patient.caretaker_id, &alert)?;
    Ok(respond("Alert sent to caregiver", alert))
}

/// POST /patient-alerts/emergency-call
async fn emergency_call(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<EmergencyRequest>,
) -> Result<Json<Value>, ApiError> {
    let patient = lookup(&state, req.patient_id).await?;

    let alert = Alert::new(
        AlertKind::Emergency911,
        &patient,
        format!("EMERGENCY: {} is calling 911!", patient.patient_name),
        "urgent",
    );

    dispatch(&state, patient.caretaker_id, &alert)?;
    Ok(respond("Emergency alert sent to caregiver", alert))
}

/// POST /patient-alerts/navigation-help
async fn navigation_help(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<NavigationHelpRequest>,
) -> Result<Json<Value>, ApiError> {
    let patient = lookup(&state, req.patient_id).await?;

    let mut location = req.location.unwrap_or_default();
    if location.address.is_none() {
        location.address = Some("Unknown location".to_string());
    }
    let mut alert = Alert::new(
        AlertKind::NavigationHelp,
        &patient,
        format!("{} needs help getting home", patient.patient_name),
        "urgent",
    );
    alert.location = Some(location);

    dispatch(&state, patient.caretaker_id, &alert)?;
    Ok(respond("Navigation alert sent to caregiver", alert))
}

/// Alert routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/patient-alerts/call-caregiver", post(call_caregiver))
        .route("/patient-alerts/emergency-call", post(emergency_call))
        .route("/patient-alerts/navigation-help", post(navigation_help))
}
