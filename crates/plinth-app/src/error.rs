//! Errors surfaced by the `plinth` binary.
//!
//! Every variant names the failing step in `operation` and keeps the lower
//! layer's error as its source; messages stay fixed.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
    /// Settings store operations failed.
    #[error("settings operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: plinth_config::ConfigError,
    },
    /// Option backend operations failed.
    #[error("storage operation failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Source backend error.
        source: plinth_config::BackendError,
    },
    /// Role or token operations failed.
    #[error("access control operation failed")]
    Access {
        /// Operation identifier.
        operation: &'static str,
        /// Source access error.
        source: plinth_config::AccessError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: plinth_telemetry::TelemetryError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source server error.
        source: anyhow::Error,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: plinth_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn backend(
        operation: &'static str,
        source: plinth_config::BackendError,
    ) -> Self {
        Self::Backend { operation, source }
    }

    pub(crate) const fn access(operation: &'static str, source: plinth_config::AccessError) -> Self {
        Self::Access { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: plinth_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn api_server(operation: &'static str, source: anyhow::Error) -> Self {
        Self::ApiServer { operation, source }
    }
}
