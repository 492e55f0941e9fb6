//! HTTP surface modules (router, middleware, handlers).

/// Capability and token middleware.
pub mod auth;
/// Admin UI bootstrap payload.
pub mod bootstrap;
/// Shared constants and header names.
pub mod constants;
/// Structured error responses.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Request-id and tracing layers.
pub mod layers;
/// Log file endpoints.
pub mod logs;
/// Router construction and server host.
pub mod router;
/// Sample endpoints.
pub mod sample;
/// Settings endpoints.
pub mod settings;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
