//! Install-time lifecycle commands.
//!
//! # Design
//! - Every step is idempotent; running a command twice leaves the same state.
//! - Uninstall only removes data when `advanced_deleteAllOnUninstall` is
//!   strictly `true` in the stored settings.

use plinth_config::{
    ADMIN_ROLE, DELETE_ALL_ON_UNINSTALL_KEY, MANAGE_CAPABILITY, SAMPLE_OPTION_NAME,
};
use tracing::info;

use crate::bootstrap::Services;
use crate::error::{AppError, AppResult};

/// Seed missing settings, provision storage, secure the log directory and grant
/// the management capability to administrators.
///
/// # Errors
///
/// Returns the first step that fails; earlier steps are kept.
pub async fn activate(services: &Services) -> AppResult<()> {
    services
        .store
        .seed_defaults()
        .await
        .map_err(|err| AppError::config("settings.seed_defaults", err))?;
    services
        .provisioner
        .provision()
        .await
        .map_err(|err| AppError::backend("storage.provision", err))?;
    services
        .logs
        .secure()
        .map_err(|err| AppError::telemetry("log_dir.secure", err))?;
    services
        .roles
        .grant_capability(ADMIN_ROLE, MANAGE_CAPABILITY)
        .await
        .map_err(|err| AppError::access("roles.grant_capability", err))?;
    info!("activation complete");
    Ok(())
}

/// Revoke the management capability from every role. Returns how many roles
/// lost it.
///
/// # Errors
///
/// Returns an error when the role document cannot be read or written.
pub async fn deactivate(services: &Services) -> AppResult<usize> {
    let revoked = services
        .roles
        .revoke_capability_everywhere(MANAGE_CAPABILITY)
        .await
        .map_err(|err| AppError::access("roles.revoke_capability", err))?;
    info!(revoked, "deactivation complete");
    Ok(revoked)
}

/// Remove auxiliary storage, stored settings, the sample message and the
/// management capability. Returns `false` without touching anything when the
/// uninstall setting is off.
///
/// # Errors
///
/// Returns the first removal that fails.
pub async fn uninstall(services: &Services) -> AppResult<bool> {
    let settings = services.store.load().await;
    if !settings.flag(DELETE_ALL_ON_UNINSTALL_KEY) {
        info!("uninstall keeps stored data; {DELETE_ALL_ON_UNINSTALL_KEY} is off");
        return Ok(false);
    }

    services
        .provisioner
        .teardown()
        .await
        .map_err(|err| AppError::backend("storage.teardown", err))?;
    services
        .store
        .purge()
        .await
        .map_err(|err| AppError::config("settings.purge", err))?;
    services
        .backend
        .delete_option(SAMPLE_OPTION_NAME)
        .await
        .map_err(|err| AppError::backend("sample.delete", err))?;
    services
        .roles
        .revoke_capability_everywhere(MANAGE_CAPABILITY)
        .await
        .map_err(|err| AppError::access("roles.revoke_capability", err))?;
    info!("uninstall removed stored data");
    Ok(true)
}
