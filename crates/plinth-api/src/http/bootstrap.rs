//! Bootstrap payload for the admin UI.
//!
//! # Design
//! - Each call mints a fresh request token for the caller.
//! - The typed payload is converted to JSON before the registered filters run,
//!   so filters may add or rewrite any field.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use plinth_config::REST_TOKEN_ACTION;
use serde_json::Value;
use tracing::error;

use crate::http::auth::RequestUser;
use crate::http::constants::{CLIENT_STORE, ROOT_ID, SERVICE_NAME, SERVICE_VERSION};
use crate::http::errors::ApiError;
use crate::models::{BootstrapData, PluginData};
use crate::state::ApiState;

/// `GET /{ns}/v1/bootstrap`.
pub(crate) async fn get_bootstrap(
    State(state): State<Arc<ApiState>>,
    Extension(RequestUser(user)): Extension<RequestUser>,
) -> Result<Json<Value>, ApiError> {
    let payload = BootstrapData {
        version: SERVICE_VERSION.to_string(),
        root_id: ROOT_ID.to_string(),
        nonce: state.authorizer.issue_token(&user, REST_TOKEN_ACTION),
        store: CLIENT_STORE.to_string(),
        rest_url: format!("{}/", state.route_base()),
        plugin_data: PluginData {
            name: SERVICE_NAME.to_string(),
            version: SERVICE_VERSION.to_string(),
            namespace: state.namespace.clone(),
        },
        settings: state.store.load().await,
    };
    let value = serde_json::to_value(payload).map_err(|err| {
        error!(error = %err, "failed to encode bootstrap payload");
        ApiError::internal("failed to encode bootstrap payload")
    })?;
    Ok(Json(state.client_data.apply(value)))
}
