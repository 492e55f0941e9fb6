//! Shared state handed to every handler.

use std::sync::Arc;

use plinth_config::{Authorizer, SettingsStore};
use plinth_telemetry::{LogDirectory, Metrics};

use crate::client_data::ClientDataFilters;

/// Collaborators the HTTP surface is built from.
pub struct ApiDependencies {
    /// REST namespace; routes live under `/{namespace}/v1`.
    pub namespace: String,
    /// Settings store.
    pub store: Arc<SettingsStore>,
    /// Capability and token checks.
    pub authorizer: Arc<dyn Authorizer>,
    /// Directory holding the service's log files.
    pub logs: LogDirectory,
    /// Metrics registry.
    pub telemetry: Metrics,
    /// Filters applied to the bootstrap payload.
    pub client_data: ClientDataFilters,
}

/// Request state shared across handlers.
pub struct ApiState {
    pub(crate) namespace: String,
    pub(crate) store: Arc<SettingsStore>,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) logs: LogDirectory,
    pub(crate) telemetry: Metrics,
    pub(crate) client_data: ClientDataFilters,
}

impl ApiState {
    /// Build state from its collaborators.
    #[must_use]
    pub fn new(dependencies: ApiDependencies) -> Self {
        let ApiDependencies {
            namespace,
            store,
            authorizer,
            logs,
            telemetry,
            client_data,
        } = dependencies;
        Self {
            namespace: namespace.trim_matches('/').to_string(),
            store,
            authorizer,
            logs,
            telemetry,
            client_data,
        }
    }

    /// Route prefix, e.g. `/plinth/v1`.
    #[must_use]
    pub fn route_base(&self) -> String {
        format!("/{}/v1", self.namespace)
    }
}
