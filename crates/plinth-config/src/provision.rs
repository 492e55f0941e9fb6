//! Lifecycle of auxiliary storage created on activation and removed on uninstall.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::BackendError;

/// Creates and removes storage that lives beside the option store.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create auxiliary storage. Must be idempotent.
    async fn provision(&self) -> Result<(), BackendError>;

    /// Remove auxiliary storage. Must be idempotent.
    async fn teardown(&self) -> Result<(), BackendError>;
}

/// Provisioner for backends without auxiliary storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
    async fn provision(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Provisioner managing the Postgres auxiliary tables.
#[derive(Debug, Clone)]
pub struct PostgresProvisioner {
    pool: PgPool,
}

impl PostgresProvisioner {
    /// Provisioner operating on `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Provisioner for PostgresProvisioner {
    async fn provision(&self) -> Result<(), BackendError> {
        plinth_data::storage::provision_auxiliary_tables(&self.pool)
            .await
            .map_err(|source| BackendError::Data {
                operation: "provision_auxiliary_tables",
                source,
            })
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        plinth_data::storage::drop_auxiliary_tables(&self.pool)
            .await
            .map_err(|source| BackendError::Data {
                operation: "drop_auxiliary_tables",
                source,
            })
    }
}
