//! Control-plane HTTP API.

pub mod interviews;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/interviews", get(interviews::list))
        .route("/v1/interviews/role", post(interviews::create_role))
        .route("/v1/interviews/project", post(interviews::create_project))
        .route(
            "/v1/interviews/repository",
            post(interviews::create_repository),
        )
        .route("/v1/interviews/:session_id", delete(interviews::stop))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
