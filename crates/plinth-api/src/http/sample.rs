//! Sample endpoints demonstrating a read route and a token-protected write route.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use chrono::Local;
use plinth_config::{SAMPLE_OPTION_NAME, sanitize_text_field};
use serde_json::Value;
use tracing::error;

use crate::http::constants::{SAMPLE_GREETING, SERVICE_VERSION, TIME_FORMAT};
use crate::http::errors::ApiError;
use crate::http::settings::parse_object;
use crate::models::{SampleResponse, SampleUpdateRequest, SampleUpdateResponse};
use crate::state::ApiState;

/// `GET /{ns}/v1/sample`.
pub(crate) async fn get_sample() -> Json<SampleResponse> {
    Json(SampleResponse {
        message: SAMPLE_GREETING.to_string(),
        version: SERVICE_VERSION.to_string(),
        time: Local::now().format(TIME_FORMAT).to_string(),
    })
}

/// `POST /{ns}/v1/sample`: store a sanitised message.
pub(crate) async fn update_sample(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SampleUpdateResponse>, ApiError> {
    let request: SampleUpdateRequest = serde_json::from_value(parse_object(&body)?)
        .map_err(|err| ApiError::bad_request(format!("invalid sample payload: {err}")))?;
    let message = request.message.as_ref().map_or_else(String::new, message_text);

    state
        .store
        .backend()
        .set_option(SAMPLE_OPTION_NAME, Value::String(message.clone()))
        .await
        .map_err(|err| {
            error!(error = %err, "failed to store sample message");
            ApiError::backend_unavailable("sample message could not be saved")
        })?;

    Ok(Json(SampleUpdateResponse {
        success: true,
        message,
    }))
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(text) => sanitize_text_field(text),
        Value::Number(number) => sanitize_text_field(&number.to_string()),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_text_sanitises_scalars() {
        assert_eq!(message_text(&json!("<b>hi</b> there")), "hi there");
        assert_eq!(message_text(&json!(42)), "42");
        assert_eq!(message_text(&json!(true)), "1");
        assert_eq!(message_text(&json!(["x"])), "");
    }

    #[tokio::test]
    async fn get_sample_reports_version() {
        let Json(body) = get_sample().await;
        assert_eq!(body.message, SAMPLE_GREETING);
        assert_eq!(body.version, SERVICE_VERSION);
        assert_eq!(body.time.len(), 19);
    }
}
