//! Error types for the data access layer.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use sqlx::migrate::MigrateError;

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors raised while talking to Postgres.
#[derive(Debug)]
pub enum DataError {
    /// Applying the embedded migrations failed.
    Migrate {
        /// Underlying migration error.
        source: MigrateError,
    },
    /// A statement against the option or auxiliary tables failed.
    Statement {
        /// Statement identifier, e.g. `upsert_option`.
        operation: &'static str,
        /// Underlying driver error.
        source: sqlx::Error,
    },
    /// A table name outside `[a-z0-9_]+` was refused before reaching SQL.
    UnsafeTableName {
        /// Refused name.
        table: String,
    },
}

impl DataError {
    /// Wrap a driver error raised by `operation`.
    #[must_use]
    pub const fn statement(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Statement { operation, source }
    }
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migrate { .. } => formatter.write_str("applying migrations failed"),
            Self::Statement { operation, .. } => write!(formatter, "statement {operation} failed"),
            Self::UnsafeTableName { table } => {
                write!(formatter, "refusing unsafe table name {table:?}")
            }
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Migrate { source } => Some(source),
            Self::Statement { source, .. } => Some(source),
            Self::UnsafeTableName { .. } => None,
        }
    }
}
