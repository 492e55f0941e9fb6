//! Option rows: one JSON blob per option name.

use serde_json::Value;
use sqlx::{Executor, Postgres};

use crate::error::{DataError, Result};

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::statement(operation, source)
}

/// Fetch the stored value for `name`, if any.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_option<'e, E>(executor: E, name: &str) -> Result<Option<Value>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar::<_, Value>(
        "SELECT option_value FROM plinth_options WHERE option_name = $1",
    )
    .bind(name)
    .fetch_optional(executor)
    .await
    .map_err(map_query_err("fetch_option"))
}

/// Insert or overwrite the value stored for `name`.
///
/// # Errors
///
/// Returns an error when the statement fails.
pub async fn upsert_option<'e, E>(executor: E, name: &str, value: &Value) -> Result<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO plinth_options (option_name, option_value, updated_at) \
         VALUES ($1, $2, now()) \
         ON CONFLICT (option_name) \
         DO UPDATE SET option_value = EXCLUDED.option_value, updated_at = now()",
    )
    .bind(name)
    .bind(value)
    .execute(executor)
    .await
    .map_err(map_query_err("upsert_option"))?;
    Ok(())
}

/// Remove the option row for `name`. Returns `true` when a row was deleted.
///
/// # Errors
///
/// Returns an error when the statement fails.
pub async fn delete_option<'e, E>(executor: E, name: &str) -> Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM plinth_options WHERE option_name = $1")
        .bind(name)
        .execute(executor)
        .await
        .map_err(map_query_err("delete_option"))?;
    Ok(result.rows_affected() > 0)
}
