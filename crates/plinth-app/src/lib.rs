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

//! Plinth application wiring.
//!
//! Layout: `config.rs` (command line and environment), `bootstrap.rs` (service
//! wiring and command dispatch), `lifecycle.rs` (activate, deactivate and
//! uninstall), `error.rs` (application errors).

/// Service wiring and command dispatch.
pub mod bootstrap;
/// Command line and environment configuration.
pub mod config;
/// Application-level errors.
pub mod error;
/// Install-time lifecycle commands.
pub mod lifecycle;

pub use bootstrap::{Services, run, run_with};
pub use config::{AppConfig, Command};
pub use error::{AppError, AppResult};
