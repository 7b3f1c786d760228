//! Patient display endpoints
//!
//! Caregiver routes (token required) edit what the companion app shows:
//! configuration, navigation landmarks, FAQs and emergency contacts. Each
//! change is pushed to `patient_{pid}` so an open display refreshes.
//! Mobile routes under `/mobile/{pid}` are read-only and unauthenticated.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::validation::require_text;
use carelink_core::{events, timestamp};

use crate::db::repos::{
    Appointment, AppointmentRepo, ContactChanges, DisplayConfig, DisplayConfigChanges, DisplayRepo,
    FaqChanges, LandmarkChanges, NewContact, NewFaq, NewLandmark, PatientRepo,
};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, IdPath, JsonBody};
use crate::state::AppState;

const PREFIX: &str = "/patient-display";

async fn ensure_patient(state: &AppState, patient_id: i32) -> Result<(), ApiError> {
    if !PatientRepo::new(&state.pool).exists(patient_id).await? {
        return Err(ApiError::not_found("Patient not found"));
    }
    Ok(())
}

fn notify(state: &AppState, patient_id: i32, event: &'static str) {
    state
        .hub
        .emit_to(events::patient_room(patient_id), event, json!({ "patient_id": patient_id }));
}

// -- configuration ----------------------------------------------------------

/// GET /patient-display/config/{pid}
async fn get_config(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
) -> Result<Json<DisplayConfig>, ApiError> {
    let repo = DisplayRepo::new(&state.pool);
    let config = match repo.config(pid).await? {
        Some(config) => config,
        None => {
            ensure_patient(&state, pid).await?;
            tracing::info!(patient_id = pid, "creating default display config");
            repo.create_default_config(pid).await?
        }
    };
    Ok(Json(config))
}

/// PUT /patient-display/config/{pid}
async fn update_config(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
    JsonBody(changes): JsonBody<DisplayConfigChanges>,
) -> Result<Json<Value>, ApiError> {
    ensure_patient(&state, pid).await?;
    let config = DisplayRepo::new(&state.pool).upsert_config(pid, changes).await?;

    state.hub.emit_to(
        events::patient_room(pid),
        events::CONFIG_UPDATED,
        json!({
            "patient_id": pid,
            "config": {
                "show_schedule": config.show_schedule,
                "show_navigation": config.show_navigation,
                "show_faq": config.show_faq,
                "caregiver_status": config.caregiver_status,
            },
        }),
    );

    Ok(Json(json!({ "message": "Configuration updated", "id": config.id })))
}

// -- landmarks --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateLandmarkRequest {
    pub step_number: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

async fn list_landmarks(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
) -> Result<Json<Value>, ApiError> {
    let landmarks = DisplayRepo::new(&state.pool).landmarks(pid).await?;
    Ok(Json(json!(landmarks)))
}

async fn create_landmark(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
    JsonBody(req): JsonBody<CreateLandmarkRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let title = require_text(req.title, "title")?;
    ensure_patient(&state, pid).await?;

    let landmark = DisplayRepo::new(&state.pool)
        .create_landmark(
            pid,
            NewLandmark {
                step_number: req.step_number.unwrap_or(1),
                title,
                description: req.description,
                photo_url: req.photo_url,
            },
        )
        .await?;

    notify(&state, pid, events::LANDMARKS_UPDATED);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Landmark created", "id": landmark.id })),
    ))
}

async fn update_landmark(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(id): IdPath,
    JsonBody(changes): JsonBody<LandmarkChanges>,
) -> Result<Json<Value>, ApiError> {
    let landmark = DisplayRepo::new(&state.pool).update_landmark(id, changes).await?;
    notify(&state, landmark.patient_id, events::LANDMARKS_UPDATED);
    Ok(Json(json!({ "message": "Landmark updated" })))
}

async fn delete_landmark(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    let pid = DisplayRepo::new(&state.pool).deactivate_landmark(id).await?;
    notify(&state, pid, events::LANDMARKS_UPDATED);
    Ok(Json(json!({ "message": "Landmark deleted" })))
}

// -- FAQs -------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateFaqRequest {
    pub question: Option<String>,
    pub answer_text: Option<String>,
    pub voice_recording_url: Option<String>,
    pub order_index: Option<i32>,
}

async fn list_faqs(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
) -> Result<Json<Value>, ApiError> {
    let faqs = DisplayRepo::new(&state.pool).faqs(pid).await?;
    Ok(Json(json!(faqs)))
}

async fn create_faq(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
    JsonBody(req): JsonBody<CreateFaqRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let question = require_text(req.question, "question")?;
    let answer_text = require_text(req.answer_text, "answer_text")?;
    ensure_patient(&state, pid).await?;

    let faq = DisplayRepo::new(&state.pool)
        .create_faq(
            pid,
            NewFaq {
                question,
                answer_text,
                voice_recording_url: req.voice_recording_url,
                order_index: req.order_index.unwrap_or(0),
            },
        )
        .await?;

    notify(&state, pid, events::FAQS_UPDATED);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "FAQ created", "id": faq.id })),
    ))
}

async fn update_faq(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(id): IdPath,
    JsonBody(changes): JsonBody<FaqChanges>,
) -> Result<Json<Value>, ApiError> {
    let faq = DisplayRepo::new(&state.pool).update_faq(id, changes).await?;
    notify(&state, faq.patient_id, events::FAQS_UPDATED);
    Ok(Json(json!({ "message": "FAQ updated" })))
}

async fn delete_faq(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    let pid = DisplayRepo::new(&state.pool).deactivate_faq(id).await?;
    notify(&state, pid, events::FAQS_UPDATED);
    Ok(Json(json!({ "message": "FAQ deleted" })))
}

// -- emergency contacts -----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub is_primary: Option<bool>,
    pub order_index: Option<i32>,
}

async fn list_contacts(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
) -> Result<Json<Value>, ApiError> {
    let contacts = DisplayRepo::new(&state.pool).contacts(pid).await?;
    Ok(Json(json!(contacts)))
}

async fn create_contact(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(pid): IdPath,
    JsonBody(req): JsonBody<CreateContactRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = require_text(req.name, "name")?;
    let phone = require_text(req.phone, "phone")?;
    ensure_patient(&state, pid).await?;

    let contact = DisplayRepo::new(&state.pool)
        .create_contact(
            pid,
            NewContact {
                name,
                relationship: req.relationship,
                phone,
                photo_url: req.photo_url,
                is_primary: req.is_primary.unwrap_or(false),
                order_index: req.order_index.unwrap_or(0),
            },
        )
        .await?;

    notify(&state, pid, events::CONTACTS_UPDATED);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Contact created", "id": contact.id })),
    ))
}

async fn update_contact(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(id): IdPath,
    JsonBody(changes): JsonBody<ContactChanges>,
) -> Result<Json<Value>, ApiError> {
    let contact = DisplayRepo::new(&state.pool).update_contact(id, changes).await?;
    notify(&state, contact.patient_id, events::CONTACTS_UPDATED);
    Ok(Json(json!({ "message": "Contact updated" })))
}

async fn delete_contact(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    IdPath(id): IdPath,
) -> Result<Json<Value>, ApiError> {
    let pid = DisplayRepo::new(&state.pool).deactivate_contact(id).await?;
    notify(&state, pid, events::CONTACTS_UPDATED);
    Ok(Json(json!({ "message": "Contact deleted" })))
}

// -- urgent message ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UrgentMessageRequest {
    pub message: Option<String>,
}

async fn urgent_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    IdPath(pid): IdPath,
    JsonBody(req): JsonBody<UrgentMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let message = require_text(req.message, "message")?;

    state.hub.emit_to(
        events::patient_room(pid),
        events::URGENT_MESSAGE,
        json!({
            "patient_id": pid,
            "message": message,
            "timestamp": timestamp::format(&timestamp::now()),
        }),
    );
    tracing::info!(patient_id = pid, sender = user.uid, "urgent message sent");

    Ok(Json(json!({ "message": "Urgent message sent" })))
}

// -- mobile (patient companion) ---------------------------------------------

fn schedule_item(appt: &Appointment) -> Value {
    json!({
        "id": appt.aid,
        "start_time": timestamp::format(&appt.start_time),
        "end_time": timestamp::format(&appt.end_time),
        "location": appt.location,
    })
}

/// Today's schedule (UTC day) plus the caregiver status line.
async fn mobile_home(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Value>, ApiError> {
    let config = DisplayRepo::new(&state.pool).any_config(pid).await?;

    let schedule = match &config {
        Some(cfg) if cfg.show_schedule => {
            let today = timestamp::now().date();
            AppointmentRepo::new(&state.pool)
                .list_for_day(pid, today)
                .await?
                .iter()
                .map(schedule_item)
                .collect()
        }
        _ => Vec::new(),
    };

    Ok(Json(json!({
        "patient_id": pid,
        "caregiver_status": config.as_ref().and_then(|c| c.caregiver_status.clone()),
        "home_address": config.as_ref().and_then(|c| c.home_address.clone()),
        "schedule": schedule,
    })))
}

async fn mobile_schedule(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Value>, ApiError> {
    let appts = AppointmentRepo::new(&state.pool).list_active_for_patient(pid).await?;
    let items: Vec<Value> = appts.iter().map(schedule_item).collect();
    Ok(Json(json!(items)))
}

async fn mobile_navigation(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Value>, ApiError> {
    let repo = DisplayRepo::new(&state.pool);
    let home_address = repo.any_config(pid).await?.and_then(|c| c.home_address);
    let landmarks: Vec<Value> = repo
        .landmarks(pid)
        .await?
        .into_iter()
        .map(|l| {
            json!({
                "step_number": l.step_number,
                "title": l.title,
                "description": l.description,
                "photo_url": l.photo_url,
            })
        })
        .collect();

    Ok(Json(json!({ "home_address": home_address, "landmarks": landmarks })))
}

async fn mobile_faqs(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Value>, ApiError> {
    let faqs: Vec<Value> = DisplayRepo::new(&state.pool)
        .faqs(pid)
        .await?
        .into_iter()
        .map(|f| {
            json!({
                "id": f.id,
                "question": f.question,
                "answer_text": f.answer_text,
                "voice_recording_url": f.voice_recording_url,
            })
        })
        .collect();
    Ok(Json(json!(faqs)))
}

async fn mobile_contacts(State(state): State<Arc<AppState>>, IdPath(pid): IdPath) -> Result<Json<Value>, ApiError> {
    let contacts = DisplayRepo::new(&state.pool).contacts(pid).await?;
    Ok(Json(json!(contacts)))
}

/// Patient display routes
pub fn router() -> Router<Arc<AppState>> {
    let caregiver = Router::new()
        .route("/config/{pid}", get(get_config).put(update_config))
        .route(
            "/landmarks/{id}",
            get(list_landmarks)
                .post(create_landmark)
                .put(update_landmark)
                .delete(delete_landmark),
        )
        .route(
            "/faqs/{id}",
            get(list_faqs).post(create_faq).put(update_faq).delete(delete_faq),
        )
        .route(
            "/contacts/{id}",
            get(list_contacts)
                .post(create_contact)
                .put(update_contact)
                .delete(delete_contact),
        )
        .route("/urgent-message/{pid}", post(urgent_message));

    let mobile = Router::new()
        .route("/mobile/{pid}/home", get(mobile_home))
        .route("/mobile/{pid}/schedule", get(mobile_schedule))
        .route("/mobile/{pid}/navigation", get(mobile_navigation))
        .route("/mobile/{pid}/faqs", get(mobile_faqs))
        .route("/mobile/{pid}/contacts", get(mobile_contacts));

    Router::new().nest(PREFIX, caregiver.merge(mobile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::NewAppointment;
    use crate::http::routes::test_support::{call, call_as, care_pair, db_state, lazy_state};
    use axum::http::Method;

    #[tokio::test]
    async fn caregiver_routes_require_token() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::GET, "/patient-display/config/1", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing or invalid authorization token");

        let app = router().with_state(lazy_state());
        let (status, _) = call_as(app, Method::GET, "/patient-display/faqs/1", None, "not-a-jwt").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn landmark_title_is_required() {
        let state = lazy_state();
        let token = state.auth.issue(1).unwrap();
        let app = router().with_state(state);
        let (status, body) = call_as(
            app,
            Method::POST,
            "/patient-display/landmarks/1",
            Some(json!({"step_number": 2})),
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: title");
    }

    #[tokio::test]
    async fn contact_needs_phone() {
        let state = lazy_state();
        let token = state.auth.issue(1).unwrap();
        let app = router().with_state(state);
        let (status, body) = call_as(
            app,
            Method::POST,
            "/patient-display/contacts/1",
            Some(json!({"name": "Sarah"})),
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: phone");
    }

    #[tokio::test]
    async fn urgent_message_reaches_patient_room() {
        let state = lazy_state();
        let token = state.auth.issue(4).unwrap();
        let mut rx = state.hub.subscribe();
        let app = router().with_state(state);

        let (status, body) = call_as(
            app,
            Method::POST,
            "/patient-display/urgent-message/7",
            Some(json!({"message": "Dinner is at six"})),
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Urgent message sent");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, events::URGENT_MESSAGE);
        assert_eq!(event.room.as_deref(), Some("patient_7"));
        assert_eq!(event.data["message"], "Dinner is at six");
        assert!(event.data["timestamp"].is_string());
    }

    #[test]
    fn schedule_items_use_display_shape() {
        let appt = Appointment {
            aid: 3,
            patient_id: 1,
            doctor_id: 2,
            start_time: timestamp::parse("2025-11-10T14:00:00").unwrap(),
            end_time: timestamp::parse("2025-11-10T14:30:00").unwrap(),
            location: None,
            active: true,
            created_at: timestamp::parse("2025-11-01T08:00:00").unwrap(),
        };
        let item = schedule_item(&appt);
        assert_eq!(item["id"], 3);
        assert_eq!(item["start_time"], "2025-11-10T14:00:00");
        assert!(item.get("doctor_id").is_none());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn config_is_created_on_read_and_upserted_on_write() {
        let state = db_state().await;
        let (user, patient) = care_pair(&state, "display-config").await;
        let token = state.auth.issue(user.uid).unwrap();
        let pid = patient.pid;

        let app = router().with_state(state.clone());
        let (status, config) =
            call_as(app, Method::GET, &format!("/patient-display/config/{pid}"), None, &token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["patient_id"], pid);
        assert_eq!(config["show_schedule"], true);
        assert_eq!(config["geofence_radius_meters"], 500);
        let id = config["id"].clone();

        sqlx::query("UPDATE patient_display_config SET updated_at = '2000-01-01' WHERE patient_id = $1")
            .bind(pid)
            .execute(&state.pool)
            .await
            .unwrap();

        let mut rx = state.hub.subscribe();
        let app = router().with_state(state.clone());
        let (status, body) = call_as(
            app,
            Method::PUT,
            &format!("/patient-display/config/{pid}"),
            Some(json!({"caregiver_status": "At the pharmacy", "show_faq": false})),
            &token,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Configuration updated");
        assert_eq!(body["id"], id);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, events::CONFIG_UPDATED);
        assert_eq!(event.room.as_deref(), Some(events::patient_room(pid).as_str()));
        assert_eq!(event.data["config"]["caregiver_status"], "At the pharmacy");
        assert_eq!(event.data["config"]["show_faq"], false);

        let stored = DisplayRepo::new(&state.pool).config(pid).await.unwrap().unwrap();
        assert!(stored.updated_at > timestamp::parse("2000-01-01T00:00:00").unwrap());
        assert!(stored.show_schedule);
        assert!(!stored.show_faq);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn list_deletes_only_deactivate() {
        let state = db_state().await;
        let (user, patient) = care_pair(&state, "display-soft").await;
        let token = state.auth.issue(user.uid).unwrap();
        let pid = patient.pid;

        let cases = [
            ("landmarks", "navigation_landmarks", json!({"title": "Blue door"})),
            ("faqs", "patient_faqs", json!({"question": "Where am I?", "answer_text": "Home"})),
            ("contacts", "emergency_contacts", json!({"name": "Sarah", "phone": "555-0100"})),
        ];
        for (path, table, create) in cases {
            let app = router().with_state(state.clone());
            let (status, body) =
                call_as(app, Method::POST, &format!("/patient-display/{path}/{pid}"), Some(create), &token)
                    .await;
            assert_eq!(status, StatusCode::CREATED, "{path}");
            let id = body["id"].as_i64().unwrap();

            let app = router().with_state(state.clone());
            let (status, _) =
                call_as(app, Method::DELETE, &format!("/patient-display/{path}/{id}"), None, &token).await;
            assert_eq!(status, StatusCode::OK, "{path}");

            let (active,): (bool,) = sqlx::query_as(&format!("SELECT active FROM {table} WHERE id = $1"))
                .bind(id as i32)
                .fetch_one(&state.pool)
                .await
                .unwrap();
            assert!(!active, "{table} row should remain, inactive");

            let app = router().with_state(state.clone());
            let (_, list) = call_as(app, Method::GET, &format!("/patient-display/{path}/{pid}"), None, &token).await;
            assert_eq!(list, json!([]), "{path}");
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn mobile_home_shows_only_todays_schedule() {
        let state = db_state().await;
        let (doctor, patient) = care_pair(&state, "display-home").await;
        let pid = patient.pid;

        let midnight = timestamp::now().date().and_time(chrono::NaiveTime::MIN);
        let appointments = AppointmentRepo::new(&state.pool);
        let mut today = None;
        for offset_hours in [-12, 1, 36] {
            let start = midnight + chrono::Duration::hours(offset_hours);
            let appt = appointments
                .create(NewAppointment {
                    patient_id: pid,
                    doctor_id: doctor.uid,
                    start_time: start,
                    end_time: start + chrono::Duration::minutes(30),
                    location: Some("Clinic".into()),
                    active: true,
                })
                .await
                .unwrap();
            if offset_hours == 1 {
                today = Some(appt.aid);
            }
        }

        let display = DisplayRepo::new(&state.pool);
        display
            .upsert_config(
                pid,
                DisplayConfigChanges {
                    caregiver_status: Some(Some("Home by five".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let app = router().with_state(state.clone());
        let (status, home) = call(app, Method::GET, &format!("/patient-display/mobile/{pid}/home"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(home["caregiver_status"], "Home by five");
        let schedule = home["schedule"].as_array().unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0]["id"], today.unwrap());

        display
            .upsert_config(
                pid,
                DisplayConfigChanges {
                    show_schedule: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let app = router().with_state(state);
        let (_, home) = call(app, Method::GET, &format!("/patient-display/mobile/{pid}/home"), None).await;
        assert_eq!(home["schedule"], json!([]));
    }
}
