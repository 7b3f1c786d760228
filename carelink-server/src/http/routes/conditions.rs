//! Condition endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::timestamp;
use carelink_core::validation::require;

use super::tasks::PatientFilter;
use crate::db::repos::{Condition, ConditionChanges, ConditionRepo, NewCondition, PatientRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConditionRequest {
    pub patient_id: Option<i32>,
    pub status: Option<String>,
    #[serde(default, with = "timestamp::iso_opt")]
    pub onset_date: Option<NaiveDateTime>,
    pub note: Option<String>,
    pub active: Option<bool>,
}

async fn create_condition(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateConditionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let patient_id = require(req.patient_id, "patient_id")?;

    if !PatientRepo::new(&state.pool).exists(patient_id).await? {
        return Err(ApiError::not_found("Patient not found"));
    }

    let condition = ConditionRepo::new(&state.pool)
        .create(NewCondition {
            patient_id,
            status: req.status,
            onset_date: req.onset_date,
            note: req.note,
            active: req.active.unwrap_or(true),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Condition created", "cid": condition.cid })),
    ))
}

async fn list_conditions(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<PatientFilter>,
) -> Result<Json<Vec<Condition>>, ApiError> {
    Ok(Json(ConditionRepo::new(&state.pool).list(filter.patient_id).await?))
}

async fn get_condition(State(state): State<Arc<AppState>>, IdPath(cid): IdPath) -> Result<Json<Condition>, ApiError> {
    Ok(Json(ConditionRepo::new(&state.pool).get(cid).await?))
}

async fn update_condition(
    State(state): State<Arc<AppState>>,
    IdPath(cid): IdPath,
    JsonBody(changes): JsonBody<ConditionChanges>,
) -> Result<Json<Value>, ApiError> {
    ConditionRepo::new(&state.pool).update(cid, changes).await?;
    Ok(Json(json!({ "message": "Condition updated" })))
}

async fn delete_condition(State(state): State<Arc<AppState>>, IdPath(cid): IdPath) -> Result<Json<Value>, ApiError> {
    ConditionRepo::new(&state.pool).delete(cid).await?;
    Ok(Json(json!({ "message": "Condition deleted" })))
}

/// Condition routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conditions", get(list_conditions).post(create_condition))
        .route("/conditions/", get(list_conditions).post(create_condition))
        .route(
            "/conditions/{cid}",
            get(get_condition).put(update_condition).delete(delete_condition),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::test_support::{call, lazy_state};
    use axum::http::Method;

    #[tokio::test]
    async fn patient_id_is_required() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::POST, "/conditions", Some(json!({"note": "mild"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: patient_id");
    }

    #[tokio::test]
    async fn non_numeric_patient_filter_is_json_400() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::GET, "/conditions?patient_id=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("patient_id"));
    }
}
