//! Capability and request-token middleware for the HTTP layer.
//!
//! # Design
//! - The calling user is forwarded by the host in `x-plinth-user`.
//! - Capability is checked before the token so an unauthorised caller learns
//!   nothing about token validity.
//! - Both checks complete before any handler touches the store.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use plinth_config::{MANAGE_CAPABILITY, REST_TOKEN_ACTION};
use tracing::warn;

use crate::http::constants::{HEADER_NONCE, HEADER_USER, QUERY_NONCE};
use crate::http::errors::ApiError;
use crate::state::ApiState;

/// Authenticated caller, inserted into request extensions after the checks pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestUser(pub(crate) String);

/// Require the management capability.
pub(crate) async fn require_capability(
    State(state): State<Arc<ApiState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, req, next, false).await
}

/// Require the management capability and a valid request token.
pub(crate) async fn require_capability_and_token(
    State(state): State<Arc<ApiState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, req, next, true).await
}

async fn authorize(
    state: &ApiState,
    mut req: Request<axum::body::Body>,
    next: Next,
    require_token: bool,
) -> Result<Response, ApiError> {
    let Some(user) = header_value(&req, HEADER_USER) else {
        return Err(deny(state, ApiError::forbidden(), "missing user"));
    };
    if !state
        .authorizer
        .user_has_capability(&user, MANAGE_CAPABILITY)
        .await
    {
        return Err(deny(state, ApiError::forbidden(), "capability missing"));
    }

    if require_token {
        let token = header_value(&req, HEADER_NONCE).or_else(|| query_token(&req));
        let valid = token.is_some_and(|token| {
            state
                .authorizer
                .verify_token(&user, &token, REST_TOKEN_ACTION)
        });
        if !valid {
            return Err(deny(state, ApiError::invalid_nonce(), "token rejected"));
        }
    }

    req.extensions_mut().insert(RequestUser(user));
    Ok(next.run(req).await)
}

fn deny(state: &ApiState, error: ApiError, reason: &'static str) -> ApiError {
    warn!(code = error.code, reason, "request denied");
    state.telemetry.inc_authorization_denial(error.code);
    error
}

fn header_value<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn query_token<B>(req: &Request<B>) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(req.uri()).ok()?;
    params
        .get(QUERY_NONCE)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_trims_and_drops_empty() {
        let req = Request::builder()
            .header(HEADER_USER, "  alice ")
            .header(HEADER_NONCE, "   ")
            .body(())
            .expect("request");
        assert_eq!(header_value(&req, HEADER_USER), Some("alice".to_string()));
        assert_eq!(header_value(&req, HEADER_NONCE), None);
    }

    #[test]
    fn query_token_reads_wpnonce() {
        let req = Request::builder()
            .uri("/plinth/v1/settings?_wpnonce=abc&x=1")
            .body(())
            .expect("request");
        assert_eq!(query_token(&req), Some("abc".to_string()));

        let bare = Request::builder()
            .uri("/plinth/v1/settings")
            .body(())
            .expect("request");
        assert_eq!(query_token(&bare), None);
    }
}
