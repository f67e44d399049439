//! Interview session handlers: create (per category), list, stop.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use iv_domain::interview::{InterviewContext, ProjectContext, RepositoryContext, RoleContext};
use iv_domain::Error;

use crate::endpoint::{self, teardown};
use crate::state::AppState;

use super::api_error;

#[derive(Debug, Serialize)]
struct CreatedSession {
    session_id: String,
    websocket_url: String,
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(body): Json<RoleContext>,
) -> Response {
    create(state, InterviewContext::Role(body)).await
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<ProjectContext>,
) -> Response {
    create(state, InterviewContext::Project(body)).await
}

pub async fn create_repository(
    State(state): State<AppState>,
    Json(body): Json<RepositoryContext>,
) -> Response {
    create(state, InterviewContext::Repository(body)).await
}

/// Mint a session id, persist the context record, and bring up the
/// session's endpoint. The record is rolled back if the endpoint never
/// comes up, so a failed create leaves no dangling state.
async fn create(state: AppState, context: InterviewContext) -> Response {
    let session_id = uuid::Uuid::new_v4().to_string();
    let kind = context.kind();

    if let Err(e) = state.shared.store.put(&session_id, context).await {
        tracing::error!(session_id, error = %e, "failed to persist context record");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to store session");
    }

    match endpoint::start_endpoint(&state.shared, &session_id, kind).await {
        Ok(websocket_url) => {
            tracing::info!(session_id, %kind, %websocket_url, "interview session created");
            (
                StatusCode::CREATED,
                Json(CreatedSession {
                    session_id,
                    websocket_url,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(session_id, %kind, error = %e, "failed to start endpoint");
            if let Err(e) = state.shared.store.delete(&session_id).await {
                tracing::warn!(session_id, error = %e, "failed to roll back context record");
            }
            let status = match e {
                Error::PortBind { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            api_error(status, "failed to start interview endpoint")
        }
    }
}

pub async fn list(State(state): State<AppState>) -> Response {
    let mut endpoints = state.registry().list();
    endpoints.sort_by(|a, b| a.port.cmp(&b.port));
    Json(json!({ "interviews": endpoints })).into_response()
}

/// Idempotent stop: closing an already-closed session reports
/// `stopped: false` rather than an error.
pub async fn stop(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let stopped = teardown::stop(
        &state.shared.registry,
        state.shared.store.as_ref(),
        &session_id,
    )
    .await;
    Json(json!({ "session_id": session_id, "stopped": stopped })).into_response()
}
