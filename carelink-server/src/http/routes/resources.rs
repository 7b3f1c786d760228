//! Community resource endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::{http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use carelink_core::validation::require_text;

use crate::db::repos::{NewResource, Resource, ResourceChanges, ResourceRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryFilter {
    pub category: Option<String>,
}

async fn create_resource(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<CreateResourceRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let title = require_text(req.title, "title")?;

    let resource = ResourceRepo::new(&state.pool)
        .create(NewResource {
            title,
            category: req.category,
            description: req.description,
            url: req.url,
            active: req.active.unwrap_or(true),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Resource created", "rid": resource.rid })),
    ))
}

/// GET /resources?category=
async fn list_resources(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<CategoryFilter>,
) -> Result<Json<Vec<Resource>>, ApiError> {
    let rows = ResourceRepo::new(&state.pool)
        .list(filter.category.as_deref())
        .await?;
    Ok(Json(rows))
}

async fn get_resource(State(state): State<Arc<AppState>>, IdPath(rid): IdPath) -> Result<Json<Resource>, ApiError> {
    Ok(Json(ResourceRepo::new(&state.pool).get(rid).await?))
}

async fn update_resource(
    State(state): State<Arc<AppState>>,
    IdPath(rid): IdPath,
    JsonBody(changes): JsonBody<ResourceChanges>,
) -> Result<Json<Value>, ApiError> {
    ResourceRepo::new(&state.pool).update(rid, changes).await?;
    Ok(Json(json!({ "message": "Resource updated" })))
}

async fn delete_resource(State(state): State<Arc<AppState>>, IdPath(rid): IdPath) -> Result<Json<Value>, ApiError> {
    ResourceRepo::new(&state.pool).delete(rid).await?;
    Ok(Json(json!({ "message": "Resource deleted" })))
}

/// Resource routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resources", get(list_resources).post(create_resource))
        .route("/resources/", get(list_resources).post(create_resource))
        .route(
            "/resources/{rid}",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
}
