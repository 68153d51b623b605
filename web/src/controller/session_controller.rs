use crate::controller::ApiResponse;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use log::*;
use serde::Serialize;
use sse::SessionId;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SessionCount {
    /// Sessions currently present in the registry.
    count: usize,
    /// Production loops still running.
    streaming: usize,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub(crate) struct BroadcastSummary {
    delivered: Vec<String>,
    /// Sessions whose channel failed; they have been removed from the registry.
    failed: Vec<String>,
}

/// GET the number of connected sessions
#[utoipa::path(
    get,
    path = "/sse/sessions",
    responses(
        (status = 200, description = "Number of registered sessions", body = SessionCount),
    )
)]
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    let count = SessionCount {
        count: app_state.registry().size(),
        streaming: app_state.sse_manager.active_streams(),
    };

    Json(ApiResponse::new(StatusCode::OK.into(), count))
}

/// POST a text message to one session
#[utoipa::path(
    post,
    path = "/sse/sessions/{session_id}/messages",
    params(
        ("session_id" = String, Path, description = "Session to push the message to"),
    ),
    request_body(content = String, content_type = "text/plain"),
    responses(
        (status = 204, description = "Message handed to the session's channel"),
        (status = 404, description = "Session is not connected"),
        (status = 410, description = "Delivery failed, session removed"),
        (status = 422, description = "Empty session id"),
    )
)]
pub async fn send(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
    payload: String,
) -> Result<impl IntoResponse, Error> {
    debug!("POST message to session {session_id}");

    let session_id = SessionId::parse(session_id)?;
    app_state.registry().send(&session_id, &payload)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST a text message to every connected session
#[utoipa::path(
    post,
    path = "/sse/broadcast",
    request_body(content = String, content_type = "text/plain"),
    responses(
        (status = 200, description = "Per-session delivery outcome", body = BroadcastSummary),
    )
)]
pub async fn broadcast(State(app_state): State<AppState>, payload: String) -> impl IntoResponse {
    let mut summary = BroadcastSummary::default();

    for (session_id, result) in app_state.registry().broadcast(&payload) {
        match result {
            Ok(()) => summary.delivered.push(session_id.to_string()),
            Err(_) => summary.failed.push(session_id.to_string()),
        }
    }
    summary.delivered.sort();
    summary.failed.sort();

    info!(
        "Broadcast to {} session(s), {} failed",
        summary.delivered.len() + summary.failed.len(),
        summary.failed.len()
    );

    Json(ApiResponse::new(StatusCode::OK.into(), summary))
}

/// DELETE a session, ending its stream
#[utoipa::path(
    delete,
    path = "/sse/sessions/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session to disconnect"),
    ),
    responses(
        (status = 204, description = "Session removed (or was not connected)"),
        (status = 422, description = "Empty session id"),
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE session {session_id}");

    let session_id = SessionId::parse(session_id)?;
    app_state.sse_manager.close(&session_id);

    Ok(StatusCode::NO_CONTENT)
}
