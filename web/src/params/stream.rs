use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct StreamParams {
    /// Caller-supplied session id. A random one is generated when absent.
    pub(crate) session_id: Option<String>,
}
