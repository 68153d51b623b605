use crate::params::stream::StreamParams;
use crate::{AppState, Error};
use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use log::*;
use sse::producer::{ClockProducer, Producer};
use sse::{SessionId, SseChannel};
use std::sync::Arc;

/// Response header carrying the id the stream was registered under.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// GET an endless stream of timestamps, one per tick.
#[utoipa::path(
    get,
    path = "/sse/hello",
    responses(
        (status = 200, description = "Event stream of `yyyy-MM-dd HH:mm:ss` timestamps", content_type = "text/event-stream", body = String,
            headers(("x-session-id" = String, description = "Generated session id to address pushes to"))),
    )
)]
pub(crate) async fn hello(State(app_state): State<AppState>) -> Response {
    let producer = ClockProducer::endless(app_state.config.tick_interval());
    open_stream(&app_state, SessionId::new(), producer)
}

/// GET a timestamp stream registered under a session id, ending on the next full minute.
#[utoipa::path(
    get,
    path = "/sse/demo",
    params(StreamParams),
    responses(
        (status = 200, description = "Event stream of timestamps until the next full minute", content_type = "text/event-stream", body = String,
            headers(("x-session-id" = String, description = "Session id the stream is registered under"))),
        (status = 422, description = "Empty session id")
    )
)]
pub(crate) async fn demo(
    State(app_state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Response, Error> {
    let session_id = match params.session_id {
        Some(id) => SessionId::parse(id)?,
        None => SessionId::new(),
    };

    let producer = ClockProducer::until_minute(app_state.config.tick_interval());
    Ok(open_stream(&app_state, session_id, producer))
}

/// Create a channel for the current connection, register it and start its loop.
fn open_stream<P: Producer>(
    app_state: &AppState,
    session_id: SessionId,
    producer: P,
) -> Response {
    debug!("Establishing SSE connection for session {session_id}");

    let header = HeaderValue::from_str(session_id.as_str());
    let (channel, stream) = SseChannel::open();

    // Detached: the loop logs its own termination.
    let handle = app_state
        .sse_manager
        .open(session_id.clone(), Arc::new(channel), producer);
    drop(handle);

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(app_state.config.keep_alive()))
        .into_response();
    match header {
        Ok(value) => {
            response.headers_mut().insert(SESSION_ID_HEADER, value);
        }
        Err(_) => {
            warn!("Session id {session_id} is not a valid header value, omitting {SESSION_ID_HEADER}")
        }
    }
    response
}
