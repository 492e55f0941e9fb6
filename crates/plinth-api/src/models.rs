//! Wire types shared by the HTTP handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use plinth_config::SettingsSnapshot;
use plinth_telemetry::MetricsSnapshot;

/// Structured error body: `{code, message, data: {status}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `rest_forbidden`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional data; carries the HTTP status.
    pub data: ErrorData,
}

/// Extra fields attached to an [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// HTTP status code.
    pub status: u16,
}

/// Response of `GET /logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResponse {
    /// Contents of the newest log file; empty when there is none.
    pub content: String,
}

/// Generic `{success}` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Whether the operation completed.
    pub success: bool,
}

/// Response of `GET /sample`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleResponse {
    /// Greeting text.
    pub message: String,
    /// Service version.
    pub version: String,
    /// Local server time, `YYYY-MM-DD HH:MM:SS`.
    pub time: String,
}

/// Body accepted by `POST /sample`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleUpdateRequest {
    /// Message to store; sanitised as plain text.
    #[serde(default)]
    pub message: Option<Value>,
}

/// Response of `POST /sample`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleUpdateResponse {
    /// Always `true` once stored.
    pub success: bool,
    /// Message as stored after sanitisation.
    pub message: String,
}

/// Identity of the service, embedded in the bootstrap payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginData {
    /// Display name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// REST namespace.
    pub namespace: String,
}

/// Payload consumed by the admin UI on start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapData {
    /// Service version.
    pub version: String,
    /// DOM id the UI mounts into.
    pub root_id: String,
    /// Fresh request token for the calling user.
    pub nonce: String,
    /// Client-side store name.
    pub store: String,
    /// Base URL of the REST namespace.
    pub rest_url: String,
    /// Identity of the service.
    pub plugin_data: PluginData,
    /// Current settings.
    pub settings: SettingsSnapshot,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok` when the service is serving.
    pub status: String,
    /// Build identifier.
    pub build: String,
    /// Settings traffic counters.
    pub metrics: MetricsSnapshot,
}
