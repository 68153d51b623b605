use crate::controller::{health_check_controller, session_controller};
use crate::stream::handler;
use crate::AppState;
use axum::{
    routing::{delete, get, post},
    Json, Router,
};
use utoipa::OpenApi;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "SSE Session Registry API"
        ),
        paths(
            handler::hello,
            handler::demo,
            health_check_controller::health_check,
            session_controller::index,
            session_controller::send,
            session_controller::broadcast,
            session_controller::delete,
        ),
        components(
            schemas(
                session_controller::SessionCount,
                session_controller::BroadcastSummary,
            )
        ),
        tags(
            (name = "sse_registry", description = "Server-Sent Events session registry")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(stream_routes(app_state.clone()))
        .merge(session_routes(app_state))
        .route("/api-docs/openapi.json", get(openapi))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse/hello", get(handler::hello))
        .route("/sse/demo", get(handler::demo))
        .with_state(app_state)
}

fn session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse/sessions", get(session_controller::index))
        .route("/sse/sessions/:session_id", delete(session_controller::delete))
        .route(
            "/sse/sessions/:session_id/messages",
            post(session_controller::send),
        )
        .route("/sse/broadcast", post(session_controller::broadcast))
        .with_state(app_state)
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
