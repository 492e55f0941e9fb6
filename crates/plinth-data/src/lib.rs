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

//! Postgres data access for Plinth: the option table and auxiliary tables.
//!
//! Layout: `options.rs` (option rows), `storage.rs` (migrations and
//! auxiliary table provisioning), `error.rs` (`DataError`).

pub mod error;
pub mod options;
pub mod storage;

pub use error::{DataError, Result as DataResult};
