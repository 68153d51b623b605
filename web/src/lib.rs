use axum::http::HeaderValue;
use log::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use error::{Error, Result};
pub use service::AppState;

mod controller;
mod error;
mod params;
pub mod router;
mod stream;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state.config.interface().to_string();
    let port = app_state.config.port;
    let cors_layer = cors_layer(&app_state.config.allowed_origins);

    let addr: SocketAddr = format!("{interface}:{port}").parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid listen address {interface}:{port}: {e}"),
        )
    })?;

    info!(
        "Server starting... listening for connections on http://{}",
        addr
    );

    let listener = TcpListener::bind(addr).await?;
    let app = router::define_routes(app_state).layer(cors_layer);

    axum::serve(listener, app).await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}
