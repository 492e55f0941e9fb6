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

//! Axum HTTP surface for the Plinth settings service.
//!
//! Layout: `http/` (router, middleware, handlers), `models.rs` (wire types),
//! `state.rs` (shared request state), `client_data.rs` (filters applied to the
//! admin bootstrap payload).

pub mod client_data;
pub mod http;
pub mod models;
pub mod state;

pub use client_data::ClientDataFilters;
pub use http::router::ApiServer;
pub use state::{ApiDependencies, ApiState};
