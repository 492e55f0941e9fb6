//! Schema migrations and auxiliary table provisioning.
//!
//! The option table is owned by the migrations in `./migrations` and exists for
//! as long as the database does. Auxiliary tables are created on activation and
//! dropped on uninstall, so they are managed with idempotent DDL instead.

use sqlx::PgPool;
use tracing::info;

use crate::error::{DataError, Result};

/// Tables created by [`provision_auxiliary_tables`].
pub const AUXILIARY_TABLES: &[&str] = &["plinth_items"];

const CREATE_ITEMS_TABLE: &str = "CREATE TABLE IF NOT EXISTS plinth_items (
    id BIGSERIAL PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    content TEXT,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    created_by BIGINT NOT NULL DEFAULT 0,
    date_created TIMESTAMPTZ NOT NULL DEFAULT now(),
    date_modified TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const CREATE_ITEMS_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS plinth_items_status_idx ON plinth_items (status)";

/// Apply the option-table migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .map_err(|source| DataError::Migrate { source })?;
    Ok(())
}

/// Create the auxiliary tables if they do not exist yet.
///
/// # Errors
///
/// Returns an error when any DDL statement fails.
pub async fn provision_auxiliary_tables(pool: &PgPool) -> Result<()> {
    for (operation, statement) in [
        ("create_items_table", CREATE_ITEMS_TABLE),
        ("create_items_status_index", CREATE_ITEMS_STATUS_INDEX),
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|source| DataError::statement(operation, source))?;
    }
    info!(tables = ?AUXILIARY_TABLES, "auxiliary tables provisioned");
    Ok(())
}

/// Drop every auxiliary table.
///
/// # Errors
///
/// Returns an error when a table name is not a plain identifier or a drop fails.
pub async fn drop_auxiliary_tables(pool: &PgPool) -> Result<()> {
    for table in AUXILIARY_TABLES {
        let statement = drop_statement(table)?;
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|source| DataError::statement("drop_auxiliary_table", source))?;
    }
    info!(tables = ?AUXILIARY_TABLES, "auxiliary tables dropped");
    Ok(())
}

fn drop_statement(table: &str) -> Result<String> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if !valid {
        return Err(DataError::UnsafeTableName {
            table: table.to_string(),
        });
    }
    Ok(format!("DROP TABLE IF EXISTS {table}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_statement_accepts_plain_identifiers() {
        let statement = drop_statement("plinth_items").expect("valid identifier");
        assert_eq!(statement, "DROP TABLE IF EXISTS plinth_items");
    }

    #[test]
    fn drop_statement_rejects_injection() {
        assert!(drop_statement("items; DROP TABLE users").is_err());
        assert!(drop_statement("").is_err());
        assert!(drop_statement("Items").is_err());
    }

    #[test]
    fn every_auxiliary_table_is_droppable() {
        for table in AUXILIARY_TABLES {
            assert!(drop_statement(table).is_ok(), "{table} should be droppable");
        }
    }
}
