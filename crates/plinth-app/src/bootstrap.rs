//! Service wiring and command dispatch.

use std::sync::Arc;

use clap::Parser;
use plinth_api::{ApiDependencies, ApiServer, ClientDataFilters};
use plinth_config::{
    Authorizer, DEBUG_MODE_KEY, FileOptionBackend, NoopProvisioner, NonceIssuer, OptionAuthorizer,
    OptionBackend, PostgresOptionBackend, PostgresProvisioner, Provisioner, REST_TOKEN_ACTION,
    RoleStore, SettingsStore, builtin_schema,
};
use plinth_telemetry::{DebugSwitch, FileLogLayer, LogDirectory, LoggingConfig, Metrics};
use tracing::info;

use crate::config::{AppConfig, Command, GrantArgs, NonceArgs};
use crate::error::{AppError, AppResult};
use crate::lifecycle;

/// Collaborators shared by every command.
pub struct Services {
    pub(crate) backend: Arc<dyn OptionBackend>,
    pub(crate) provisioner: Arc<dyn Provisioner>,
    pub(crate) store: Arc<SettingsStore>,
    pub(crate) roles: RoleStore,
    pub(crate) logs: LogDirectory,
    pub(crate) debug: DebugSwitch,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("store", &self.store)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Connect the backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be reached or migrated, or the
    /// stored settings cannot be read.
    pub async fn connect(config: &AppConfig, debug: DebugSwitch) -> AppResult<Self> {
        let logs = LogDirectory::new(&config.log_dir);
        if let Some(url) = config.database_url.as_deref() {
            let postgres = PostgresOptionBackend::connect(url)
                .await
                .map_err(|err| AppError::backend("postgres.connect", err))?;
            let provisioner = Arc::new(PostgresProvisioner::new(postgres.pool().clone()));
            info!("using postgres option backend");
            Self::from_parts(Arc::new(postgres), provisioner, logs, debug).await
        } else {
            info!(path = %config.data_file.display(), "using file option backend");
            Self::from_parts(
                Arc::new(FileOptionBackend::new(&config.data_file)),
                Arc::new(NoopProvisioner),
                logs,
                debug,
            )
            .await
        }
    }

    /// Wire services over an existing backend. The debug switch follows the
    /// `debug_enableMode` setting from here on.
    ///
    /// # Errors
    ///
    /// Returns an error when the built-in schema cannot be frozen.
    pub async fn from_parts(
        backend: Arc<dyn OptionBackend>,
        provisioner: Arc<dyn Provisioner>,
        logs: LogDirectory,
        debug: DebugSwitch,
    ) -> AppResult<Self> {
        let schema = builtin_schema().map_err(|err| AppError::config("schema.freeze", err))?;
        let mut store = SettingsStore::new(schema, Arc::clone(&backend));
        let follower = debug.clone();
        store.on_change(move |snapshot| follower.set(snapshot.flag(DEBUG_MODE_KEY)));

        let current = store.load().await;
        debug.set(current.flag(DEBUG_MODE_KEY));

        Ok(Self {
            roles: RoleStore::new(Arc::clone(&backend)),
            backend,
            provisioner,
            store: Arc::new(store),
            logs,
            debug,
        })
    }

    /// Settings store.
    #[must_use]
    pub fn store(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.store)
    }

    /// Switch gating non-error file logging.
    #[must_use]
    pub const fn debug(&self) -> &DebugSwitch {
        &self.debug
    }

    async fn authorizer(&self, configured: Option<&str>) -> AppResult<OptionAuthorizer> {
        let nonces = NonceIssuer::from_backend(self.backend.as_ref(), configured)
            .await
            .map_err(|err| AppError::access("nonce_issuer.from_backend", err))?;
        Ok(OptionAuthorizer::new(self.roles.clone(), nonces))
    }
}

/// Parse the process arguments and run the selected command.
///
/// # Errors
///
/// Returns an error if configuration, wiring or the command itself fails.
pub async fn run() -> AppResult<()> {
    run_with(AppConfig::parse()).await
}

/// Run a command from an already parsed configuration.
///
/// # Errors
///
/// Returns an error if configuration, wiring or the command itself fails.
pub async fn run_with(config: AppConfig) -> AppResult<()> {
    config.validate()?;

    let debug = DebugSwitch::new(false);
    let logging = LoggingConfig {
        level: &config.log_level,
        format: config.log_format(),
        ..LoggingConfig::default()
    };
    let file_log = FileLogLayer::new(LogDirectory::new(&config.log_dir), debug.clone());
    plinth_telemetry::init_logging(&logging, Some(file_log))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let services = Services::connect(&config, debug).await?;
    dispatch(&config, &services).await
}

async fn dispatch(config: &AppConfig, services: &Services) -> AppResult<()> {
    match &config.command {
        Command::Serve => serve(config, services).await,
        Command::Activate => lifecycle::activate(services).await,
        Command::Deactivate => lifecycle::deactivate(services).await.map(|_| ()),
        Command::Uninstall => lifecycle::uninstall(services).await.map(|_| ()),
        Command::Nonce(NonceArgs { user }) => {
            let authorizer = services.authorizer(config.nonce_secret.as_deref()).await?;
            println!("{}", authorizer.issue_token(user, REST_TOKEN_ACTION));
            Ok(())
        }
        Command::Grant(GrantArgs { user, role }) => {
            services
                .roles
                .assign_role(user, role)
                .await
                .map_err(|err| AppError::access("roles.assign", err))?;
            info!(user = %user, role = %role, "role assigned");
            Ok(())
        }
    }
}

async fn serve(config: &AppConfig, services: &Services) -> AppResult<()> {
    let authorizer = services.authorizer(config.nonce_secret.as_deref()).await?;
    let telemetry = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

    let server = ApiServer::new(ApiDependencies {
        namespace: config.namespace.clone(),
        store: services.store(),
        authorizer: Arc::new(authorizer),
        logs: services.logs.clone(),
        telemetry,
        client_data: ClientDataFilters::new(),
    });

    info!(
        addr = %config.bind_addr,
        namespace = %config.namespace,
        debug = services.debug.is_enabled(),
        "Launching API listener"
    );
    server
        .serve(config.bind_addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))
}
