//! Shared HTTP constants (headers, query parameters, error codes).

pub(crate) const HEADER_USER: &str = "x-plinth-user";
pub(crate) const HEADER_NONCE: &str = "x-plinth-nonce";
pub(crate) const QUERY_NONCE: &str = "_wpnonce";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const CODE_FORBIDDEN: &str = "rest_forbidden";
pub(crate) const CODE_INVALID_NONCE: &str = "rest_invalid_nonce";
pub(crate) const CODE_INVALID_PARAM: &str = "rest_invalid_param";
pub(crate) const CODE_BACKEND_UNAVAILABLE: &str = "rest_backend_unavailable";
pub(crate) const CODE_INTERNAL: &str = "rest_internal_error";

pub(crate) const SERVICE_NAME: &str = "Plinth";
pub(crate) const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub(crate) const SAMPLE_GREETING: &str = "Hello from Plinth!";
pub(crate) const ROOT_ID: &str = "plinth";
pub(crate) const CLIENT_STORE: &str = "plinth";
pub(crate) const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
