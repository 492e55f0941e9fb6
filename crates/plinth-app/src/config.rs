//! Command line and environment configuration.
//!
//! # Design
//! - Every option can be given as a flag or as a `PLINTH_*` environment variable.
//! - A database URL selects the Postgres backend; otherwise options live in a
//!   JSON file.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use plinth_telemetry::{DEFAULT_LOG_LEVEL, LogFormat};

use crate::error::{AppError, AppResult};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7070";
const DEFAULT_NAMESPACE: &str = "plinth";
const DEFAULT_DATA_FILE: &str = "plinth-options.json";
const DEFAULT_LOG_DIR: &str = "plinth-logs";

/// Resolved process configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "plinth", version, about = "Typed settings service")]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    #[arg(long, global = true, env = "PLINTH_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,
    /// REST namespace; routes are served under `/{namespace}/v1`.
    #[arg(long, global = true, env = "PLINTH_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// Postgres connection string. Selects the Postgres backend when set.
    #[arg(long, global = true, env = "PLINTH_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
    /// JSON file holding options when no database is configured.
    #[arg(long, global = true, env = "PLINTH_DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,
    /// Directory receiving log files.
    #[arg(long, global = true, env = "PLINTH_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,
    /// Secret keying request tokens. A stored secret is used when unset.
    #[arg(long, global = true, env = "PLINTH_NONCE_SECRET", hide_env_values = true)]
    pub nonce_secret: Option<String>,
    /// Console log format (`json` or `pretty`).
    #[arg(long, global = true, env = "PLINTH_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    /// Console log level, used when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "PLINTH_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Commands understood by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve,
    /// Seed defaults, provision storage, secure the log directory and grant the
    /// management capability to administrators.
    Activate,
    /// Revoke the management capability from every role.
    Deactivate,
    /// Remove all stored data when the uninstall setting allows it.
    Uninstall,
    /// Print a request token for a user.
    Nonce(NonceArgs),
    /// Assign a role to a user.
    Grant(GrantArgs),
}

/// Arguments of `nonce`.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct NonceArgs {
    /// User the token is issued to.
    #[arg(long)]
    pub user: String,
}

/// Arguments of `grant`.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct GrantArgs {
    /// User receiving the role.
    #[arg(long)]
    pub user: String,
    /// Role to assign.
    #[arg(long, default_value = plinth_config::ADMIN_ROLE)]
    pub role: String,
}

impl AppConfig {
    /// Reject values that parse but cannot be served.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> AppResult<()> {
        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() {
            return Err(AppError::InvalidConfig {
                field: "namespace",
                reason: "empty",
                value: Some(self.namespace.clone()),
            });
        }
        if namespace.chars().any(|ch| ch.is_whitespace() || ch == '?' || ch == '#') {
            return Err(AppError::InvalidConfig {
                field: "namespace",
                reason: "invalid_characters",
                value: Some(self.namespace.clone()),
            });
        }
        if self.bind_addr.port() == 0 && self.command == Command::Serve {
            return Err(AppError::InvalidConfig {
                field: "bind_addr",
                reason: "zero_port",
                value: Some(self.bind_addr.to_string()),
            });
        }
        if self
            .nonce_secret
            .as_deref()
            .is_some_and(|secret| secret.trim().is_empty())
        {
            return Err(AppError::InvalidConfig {
                field: "nonce_secret",
                reason: "empty",
                value: None,
            });
        }
        Ok(())
    }

    /// Console log format, inferred from the build profile when unset.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(LogFormat::infer)
    }
}
