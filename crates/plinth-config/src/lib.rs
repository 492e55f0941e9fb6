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

//! Typed settings for the Plinth admin service.
//!
//! Layout: `schema.rs` (definitions, registry, frozen schema), `defaults.rs`
//! (built-in keys and option names), `sanitize.rs` (lenient coercion of client
//! input), `backend.rs` (`OptionBackend` implementations), `store.rs`
//! (`SettingsStore` cache), `access.rs` (roles, capabilities and request
//! tokens), `provision.rs` (auxiliary storage lifecycle).

pub mod access;
pub mod backend;
pub mod defaults;
pub mod error;
pub mod provision;
pub mod sanitize;
pub mod schema;
pub mod snapshot;
pub mod store;

pub use access::{
    Authorizer, NonceIssuer, OptionAuthorizer, REST_TOKEN_ACTION, RoleStore, RolesDocument,
};
pub use backend::{FileOptionBackend, MemoryOptionBackend, OptionBackend, PostgresOptionBackend};
pub use defaults::{
    ADMIN_ROLE, DEBUG_MODE_KEY, DELETE_ALL_ON_UNINSTALL_KEY, ENABLE_FEATURE_KEY, EXAMPLE_TEXT_KEY,
    MANAGE_CAPABILITY, SAMPLE_OPTION_NAME, SETTINGS_OPTION_NAME, builtin_definitions,
    builtin_registry, builtin_schema,
};
pub use error::{AccessError, BackendError, ConfigError, ConfigResult};
pub use provision::{NoopProvisioner, PostgresProvisioner, Provisioner};
pub use sanitize::{sanitize, sanitize_text_field};
pub use schema::{
    SanitizeRule, Schema, SchemaExtension, SchemaRegistry, SettingDefinition, SettingKind,
    SettingValue,
};
pub use snapshot::SettingsSnapshot;
pub use store::{ChangeListener, SettingsStore};
