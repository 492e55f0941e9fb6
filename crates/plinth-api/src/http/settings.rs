//! Settings read/write handlers.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use plinth_config::{SettingsSnapshot, sanitize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::http::errors::ApiError;
use crate::state::ApiState;

/// `GET /{ns}/v1/settings`: the merged settings snapshot.
pub(crate) async fn get_settings(
    State(state): State<Arc<ApiState>>,
) -> Json<SettingsSnapshot> {
    let snapshot = state.store.load().await;
    state.telemetry.inc_settings_read();
    Json(snapshot)
}

/// `GET /{ns}/v1/settings/schema`: description of every recognised key.
pub(crate) async fn get_settings_schema(State(state): State<Arc<ApiState>>) -> Json<Value> {
    Json(state.store.schema().describe())
}

/// `PATCH /{ns}/v1/settings`: sanitise a partial update and persist it.
pub(crate) async fn update_settings(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SettingsSnapshot>, ApiError> {
    let raw = parse_object(&body)?;
    let current = state.store.load().await;
    let next = sanitize(&raw, &current, state.store.schema());
    let saved = state.store.save(&next).await.map_err(|err| {
        error!(error = %err, "failed to persist settings");
        ApiError::backend_unavailable("settings could not be saved")
    })?;
    state.telemetry.inc_settings_write();
    info!(keys = raw.as_object().map_or(0, Map::len), "settings updated");
    Ok(Json(saved))
}

/// Parse a request body that must be a JSON object; an empty body counts as `{}`.
pub(crate) fn parse_object(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ApiError::bad_request("request body must be a JSON object")),
        Err(err) => Err(ApiError::bad_request(format!("invalid JSON body: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn parse_object_accepts_objects_and_empty_bodies() {
        assert_eq!(parse_object(b"").expect("empty"), json!({}));
        assert_eq!(parse_object(b" \n").expect("blank"), json!({}));
        assert_eq!(
            parse_object(br#"{"debug_enableMode": true}"#).expect("object"),
            json!({"debug_enableMode": true})
        );
    }

    #[test]
    fn parse_object_rejects_other_shapes() {
        for body in [&b"[1]"[..], b"\"text\"", b"null", b"{broken"] {
            let err = parse_object(body).expect_err("rejected");
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
    }
}
