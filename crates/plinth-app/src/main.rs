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

//! Binary entrypoint for the Plinth settings service.

use plinth_app::{AppResult, run};

/// Parse the command line and run the selected command.
#[tokio::main]
async fn main() -> AppResult<()> {
    run().await
}
