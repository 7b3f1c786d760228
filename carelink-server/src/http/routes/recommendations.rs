//! Recommendation endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::validation::{require, require_text};

use super::tasks::PatientFilter;
use crate::db::repos::{NewRecommendation, PatientRepo, Recommendation, RecommendationChanges, RecommendationRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRecommendationRequest {
    pub patient_id: Option<i32>,
    pub title: Option<String>,
    pub sources: Option<String>,
    pub active: Option<bool>,
}

async fn create_recommendation(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateRecommendationRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let patient_id = require(req.patient_id, "patient_id")?;
    let title = require_text(req.title, "title")?;

    if !PatientRepo::new(&state.pool).exists(patient_id).await? {
        return Err(ApiError::not_found("Patient not found"));
    }

    let rec = RecommendationRepo::new(&state.pool)
        .create(NewRecommendation {
            patient_id,
            title,
            sources: req.sources,
            active: req.active.unwrap_or(true),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Recommendation created", "rid": rec.rid })),
    ))
}

async fn list_recommendations(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<PatientFilter>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    Ok(Json(RecommendationRepo::new(&state.pool).list(filter.patient_id).await?))
}

async fn get_recommendation(
    State(state): State<Arc<AppState>>,
    IdPath(rid): IdPath,
) -> Result<Json<Recommendation>, ApiError> {
    Ok(Json(RecommendationRepo::new(&state.pool).get(rid).await?))
}

async fn update_recommendation(
    State(state): State<Arc<AppState>>,
    IdPath(rid): IdPath,
    JsonBody(changes): JsonBody<RecommendationChanges>,
) -> Result<Json<Value>, ApiError> {
    RecommendationRepo::new(&state.pool).update(rid, changes).await?;
    Ok(Json(json!({ "message": "Recommendation updated" })))
}

async fn delete_recommendation(
    State(state): State<Arc<AppState>>,
    IdPath(rid): IdPath,
) -> Result<Json<Value>, ApiError> {
    RecommendationRepo::new(&state.pool).delete(rid).await?;
    Ok(Json(json!({ "message": "Recommendation deleted" })))
}

/// Recommendation routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", get(list_recommendations).post(create_recommendation))
        .route("/recommendations/", get(list_recommendations).post(create_recommendation))
        .route(
            "/recommendations/{rid}",
            get(get_recommendation)
                .put(update_recommendation)
                .delete(delete_recommendation),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::test_support::{call, lazy_state};
    use axum::http::Method;

    #[tokio::test]
    async fn title_is_required() {
        let app = router().with_state(lazy_state());
        let (status, body) = call(app, Method::POST, "/recommendations", Some(json!({"patient_id": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: title");
    }
}
