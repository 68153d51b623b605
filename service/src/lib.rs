use config::Config;
use log::info;
use sse::{Manager, SessionRegistry};
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Build the process-wide session registry and the stream manager on top of it.
pub fn init_sse(config: &Config) -> Arc<Manager> {
    info!(
        "SSE config: tick_interval={}ms, keep_alive={}s",
        config.tick_interval_ms, config.keep_alive_secs,
    );

    let registry = Arc::new(SessionRegistry::new());
    Arc::new(Manager::new(registry))
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_manager: Arc<Manager>,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, sse_manager: &Arc<Manager>) -> Self {
        Self {
            sse_manager: Arc::clone(sse_manager),
            config: app_config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.sse_manager.registry().as_ref()
    }
}
