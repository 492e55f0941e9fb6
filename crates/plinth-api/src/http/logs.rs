//! Log file endpoints.
//!
//! # Design
//! - File access is blocking, so it runs on the blocking pool.
//! - Reads return the newest file only; deletes remove every log file.

use std::sync::Arc;

use axum::{Json, extract::State};
use plinth_telemetry::LogDirectory;
use tracing::{error, info};

use crate::http::errors::ApiError;
use crate::models::{LogsResponse, SuccessResponse};
use crate::state::ApiState;

/// `GET /{ns}/v1/logs`: contents of the newest log file.
pub(crate) async fn get_logs(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<LogsResponse>, ApiError> {
    let content = run_blocking(state.logs.clone(), LogDirectory::latest_contents).await?;
    Ok(Json(LogsResponse { content }))
}

/// `DELETE /{ns}/v1/logs`: remove every log file.
pub(crate) async fn clear_logs(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let removed = run_blocking(state.logs.clone(), LogDirectory::clear).await?;
    info!(removed, "log files cleared");
    Ok(Json(SuccessResponse { success: true }))
}

async fn run_blocking<T, F>(logs: LogDirectory, operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&LogDirectory) -> plinth_telemetry::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || operation(&logs))
        .await
        .map_err(|err| {
            error!(error = %err, "log task failed");
            ApiError::internal("log task failed")
        })?
        .map_err(|err| {
            error!(error = %err, "log directory operation failed");
            ApiError::internal("log files could not be accessed")
        })
}
