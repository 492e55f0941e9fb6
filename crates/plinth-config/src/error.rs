//! Error types for settings, backends and access control.

use std::io;

use thiserror::Error;

/// Primary error type for settings operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key is not part of the frozen schema.
    #[error("unknown setting key")]
    UnknownKey {
        /// Key requested by the caller.
        key: String,
    },
    /// A definition's default does not match its declared kind.
    #[error("setting default does not match its kind")]
    InvalidDefault {
        /// Key of the offending definition.
        key: String,
        /// Declared kind name.
        expected: &'static str,
    },
    /// A value did not match the kind declared for its key.
    #[error("setting value has the wrong type")]
    TypeMismatch {
        /// Key being written.
        key: String,
        /// Declared kind name.
        expected: &'static str,
    },
    /// Kind name parsed from text was not recognised.
    #[error("unknown setting kind")]
    UnknownKind {
        /// Kind name provided by the caller.
        value: String,
    },
    /// Backend operation failed.
    #[error("option backend failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Source backend error.
        source: BackendError,
    },
}

/// Failures raised by option backends.
#[derive(Debug, Error)]
pub enum BackendError {
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// Stored document could not be encoded or decoded.
    #[error("option document could not be serialised")]
    Serialize {
        /// Operation identifier.
        operation: &'static str,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// Data layer operation failed.
    #[error("data access failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: plinth_data::DataError,
    },
    /// Backend reported that the write was not applied.
    #[error("option write rejected")]
    Rejected {
        /// Option name that was rejected.
        name: String,
    },
}

/// Failures raised by role storage and token handling.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Role document could not be read or written.
    #[error("role storage failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Source backend error.
        source: BackendError,
    },
    /// Secret used to sign tokens was empty.
    #[error("token secret is empty")]
    EmptySecret,
}

/// Convenience alias for settings results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn backend_error_chains_through_config_error() {
        let err = ConfigError::Backend {
            operation: "save",
            source: BackendError::Io {
                operation: "write_file",
                source: io::Error::other("disk full"),
            },
        };
        assert_eq!(err.to_string(), "option backend failed");
        let source = err.source().expect("backend source");
        assert_eq!(source.to_string(), "filesystem operation failed");
        assert!(source.source().is_some());
    }

    #[test]
    fn access_error_messages_are_stable() {
        assert_eq!(AccessError::EmptySecret.to_string(), "token secret is empty");
        let err = AccessError::Backend {
            operation: "load_roles",
            source: BackendError::Rejected {
                name: "plinth_user_roles".into(),
            },
        };
        assert_eq!(err.to_string(), "role storage failed");
    }
}
