//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::string::FromUtf8Error;

use prometheus::Error as PrometheusError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step at which a Prometheus collector failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStage {
    /// Constructing the collector from its options.
    Build,
    /// Adding the collector to the registry.
    Register,
}

impl CollectorStage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Register => "register",
        }
    }
}

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// A global subscriber was already installed, or installation failed.
    Subscriber {
        /// Underlying installation error.
        source: TryInitError,
    },
    /// A metric collector could not be built or registered.
    Collector {
        /// Metric name.
        name: &'static str,
        /// Step that failed.
        stage: CollectorStage,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoding the registry in the text exposition format failed.
    Exposition {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The encoded registry was not UTF-8.
    ExpositionUtf8 {
        /// Underlying conversion error.
        source: FromUtf8Error,
    },
    /// Reading or writing a log file failed.
    LogFile {
        /// Operation identifier.
        operation: &'static str,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl TelemetryError {
    pub(crate) fn log_file(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::LogFile {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscriber { .. } => formatter.write_str("tracing subscriber not installed"),
            Self::Collector { name, stage, .. } => {
                write!(formatter, "metric {name} failed at {} step", stage.as_str())
            }
            Self::Exposition { .. } | Self::ExpositionUtf8 { .. } => {
                formatter.write_str("metrics exposition failed")
            }
            Self::LogFile {
                operation, path, ..
            } => write!(formatter, "log file {operation} failed for {}", path.display()),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Subscriber { source } => Some(source),
            Self::Collector { source, .. } | Self::Exposition { source } => Some(source),
            Self::ExpositionUtf8 { source } => Some(source),
            Self::LogFile { source, .. } => Some(source),
        }
    }
}
