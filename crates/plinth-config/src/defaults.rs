//! Built-in settings keys, option names and capability names.

use crate::error::ConfigResult;
use crate::schema::{Schema, SchemaRegistry, SettingDefinition};

/// Option holding the persisted settings blob.
pub const SETTINGS_OPTION_NAME: &str = "plinth_settings";
/// Option holding the message written by the sample endpoint.
pub const SAMPLE_OPTION_NAME: &str = "plinth_settings_sample_message";
/// Option holding the role and user capability document.
pub const ROLES_OPTION_NAME: &str = "plinth_user_roles";
/// Option holding the generated token secret when none is configured.
pub const NONCE_SALT_OPTION_NAME: &str = "plinth_nonce_salt";

/// Capability required by every admin endpoint.
pub const MANAGE_CAPABILITY: &str = "manage_plinth";
/// Role that receives [`MANAGE_CAPABILITY`] on activation.
pub const ADMIN_ROLE: &str = "administrator";

/// Master switch for the example feature.
pub const ENABLE_FEATURE_KEY: &str = "global_enableFeature";
/// Example free-text setting.
pub const EXAMPLE_TEXT_KEY: &str = "global_exampleText";
/// Gates non-error log records written to the log directory.
pub const DEBUG_MODE_KEY: &str = "debug_enableMode";
/// When set, uninstall removes all persisted data.
pub const DELETE_ALL_ON_UNINSTALL_KEY: &str = "advanced_deleteAllOnUninstall";

/// Definitions shipped with the service.
#[must_use]
pub fn builtin_definitions() -> Vec<SettingDefinition> {
    vec![
        SettingDefinition::boolean(ENABLE_FEATURE_KEY, true),
        SettingDefinition::string(EXAMPLE_TEXT_KEY, "Hello from Plinth!"),
        SettingDefinition::boolean(DEBUG_MODE_KEY, false),
        SettingDefinition::boolean(DELETE_ALL_ON_UNINSTALL_KEY, false),
    ]
}

/// Registry pre-loaded with [`builtin_definitions`]; callers may register more
/// before freezing.
///
/// # Errors
///
/// Propagates registration failures.
pub fn builtin_registry() -> ConfigResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.register(builtin_definitions())?;
    Ok(registry)
}

/// Frozen schema holding only the built-in definitions.
///
/// # Errors
///
/// Propagates registration failures.
pub fn builtin_schema() -> ConfigResult<Schema> {
    builtin_registry()?.freeze()
}
