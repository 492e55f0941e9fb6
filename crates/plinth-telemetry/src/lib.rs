#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Telemetry primitives shared across the Plinth workspace.
//!
//! Layout: `init.rs` (subscriber installation), `file_log.rs` (debug-gated log
//! file layer), `log_dir.rs` (date-stamped log files), `metrics.rs`
//! (Prometheus registry).

pub mod error;
pub mod file_log;
pub mod init;
pub mod log_dir;
pub mod metrics;

pub use error::{CollectorStage, Result, TelemetryError};
pub use file_log::{DebugSwitch, FileLogLayer};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use log_dir::LogDirectory;
pub use metrics::{Metrics, MetricsSnapshot};
