//! Structured API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::http::constants::{
    CODE_BACKEND_UNAVAILABLE, CODE_FORBIDDEN, CODE_INTERNAL, CODE_INVALID_NONCE,
    CODE_INVALID_PARAM,
};
use crate::models::{ErrorBody, ErrorData};

/// Error rendered as `{code, message, data: {status}}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub(crate) fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            CODE_FORBIDDEN,
            "Sorry, you are not allowed to access this resource.",
        )
    }

    pub(crate) fn invalid_nonce() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            CODE_INVALID_NONCE,
            "Invalid or missing nonce.",
        )
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_INVALID_PARAM, message)
    }

    pub(crate) fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            CODE_BACKEND_UNAVAILABLE,
            message,
        )
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CODE_INTERNAL, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
            data: ErrorData {
                status: self.status.as_u16(),
            },
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_map_to_status_and_code() {
        let cases = [
            (ApiError::forbidden(), StatusCode::FORBIDDEN, CODE_FORBIDDEN),
            (
                ApiError::invalid_nonce(),
                StatusCode::FORBIDDEN,
                CODE_INVALID_NONCE,
            ),
            (
                ApiError::bad_request("x"),
                StatusCode::BAD_REQUEST,
                CODE_INVALID_PARAM,
            ),
            (
                ApiError::backend_unavailable("x"),
                StatusCode::SERVICE_UNAVAILABLE,
                CODE_BACKEND_UNAVAILABLE,
            ),
            (
                ApiError::internal("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
                CODE_INTERNAL,
            ),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status, status);
            assert_eq!(error.code, code);
            assert_eq!(error.into_response().status(), status);
        }
    }
}
