//! Persistence contract for opaque option blobs and its implementations.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::BackendError;

/// Key/value store for JSON option blobs.
#[async_trait]
pub trait OptionBackend: Send + Sync {
    /// Stored value for `name`, `None` when the option does not exist.
    async fn get_option(&self, name: &str) -> Result<Option<Value>, BackendError>;

    /// Store `value` under `name`. Returns `true` when the stored value changed.
    async fn set_option(&self, name: &str, value: Value) -> Result<bool, BackendError>;

    /// Remove `name`. Returns `true` when an option was removed.
    async fn delete_option(&self, name: &str) -> Result<bool, BackendError>;
}

/// In-process backend used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryOptionBackend {
    options: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionBackend {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with `options`.
    #[must_use]
    pub fn with_options(options: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            options: RwLock::new(options.into_iter().collect()),
        }
    }
}

#[async_trait]
impl OptionBackend for MemoryOptionBackend {
    async fn get_option(&self, name: &str) -> Result<Option<Value>, BackendError> {
        Ok(self.options.read().await.get(name).cloned())
    }

    async fn set_option(&self, name: &str, value: Value) -> Result<bool, BackendError> {
        let mut options = self.options.write().await;
        if options.get(name) == Some(&value) {
            return Ok(false);
        }
        options.insert(name.to_string(), value);
        Ok(true)
    }

    async fn delete_option(&self, name: &str) -> Result<bool, BackendError> {
        Ok(self.options.write().await.remove(name).is_some())
    }
}

/// Backend persisting every option in one JSON document on disk.
///
/// Writes go to a sibling temporary file that is renamed over the document.
#[derive(Debug)]
pub struct FileOptionBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileOptionBackend {
    /// Backend reading and writing `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the JSON document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, BackendError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(BackendError::Io {
                    operation: "read_options_file",
                    source,
                });
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| BackendError::Serialize {
            operation: "decode_options_file",
            source,
        })
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), BackendError> {
        let encoded = serde_json::to_vec_pretty(document).map_err(|source| {
            BackendError::Serialize {
                operation: "encode_options_file",
                source,
            }
        })?;
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| BackendError::Io {
                    operation: "create_options_dir",
                    source,
                })?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, encoded)
            .await
            .map_err(|source| BackendError::Io {
                operation: "write_options_file",
                source,
            })?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| BackendError::Io {
                operation: "replace_options_file",
                source,
            })?;
        debug!(path = %self.path.display(), "options file written");
        Ok(())
    }
}

#[async_trait]
impl OptionBackend for FileOptionBackend {
    async fn get_option(&self, name: &str) -> Result<Option<Value>, BackendError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.remove(name))
    }

    async fn set_option(&self, name: &str, value: Value) -> Result<bool, BackendError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        if document.get(name) == Some(&value) {
            return Ok(false);
        }
        document.insert(name.to_string(), value);
        self.write_document(&document).await?;
        Ok(true)
    }

    async fn delete_option(&self, name: &str) -> Result<bool, BackendError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(name).is_none() {
            return Ok(false);
        }
        self.write_document(&document).await?;
        Ok(true)
    }
}

/// Backend storing options in the `plinth_options` Postgres table.
#[derive(Debug, Clone)]
pub struct PostgresOptionBackend {
    pool: PgPool,
}

impl PostgresOptionBackend {
    /// Connect to `database_url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection or the migrations fail.
    pub async fn connect(database_url: &str) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|source| BackendError::Data {
                operation: "connect",
                source: plinth_data::DataError::statement("connect_pool", source),
            })?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the migrations fail.
    pub async fn from_pool(pool: PgPool) -> Result<Self, BackendError> {
        plinth_data::storage::run_migrations(&pool)
            .await
            .map_err(|source| BackendError::Data {
                operation: "run_migrations",
                source,
            })?;
        Ok(Self { pool })
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OptionBackend for PostgresOptionBackend {
    async fn get_option(&self, name: &str) -> Result<Option<Value>, BackendError> {
        plinth_data::options::fetch_option(&self.pool, name)
            .await
            .map_err(|source| BackendError::Data {
                operation: "get_option",
                source,
            })
    }

    async fn set_option(&self, name: &str, value: Value) -> Result<bool, BackendError> {
        let current = self.get_option(name).await?;
        if current.as_ref() == Some(&value) {
            return Ok(false);
        }
        plinth_data::options::upsert_option(&self.pool, name, &value)
            .await
            .map_err(|source| BackendError::Data {
                operation: "set_option",
                source,
            })?;
        Ok(true)
    }

    async fn delete_option(&self, name: &str) -> Result<bool, BackendError> {
        plinth_data::options::delete_option(&self.pool, name)
            .await
            .map_err(|source| BackendError::Data {
                operation: "delete_option",
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_backend_reports_changes() {
        let backend = MemoryOptionBackend::new();
        assert_eq!(backend.get_option("a").await.expect("get"), None);
        assert!(backend.set_option("a", json!(1)).await.expect("set"));
        assert!(!backend.set_option("a", json!(1)).await.expect("same"));
        assert_eq!(backend.get_option("a").await.expect("get"), Some(json!(1)));
        assert!(backend.delete_option("a").await.expect("delete"));
        assert!(!backend.delete_option("a").await.expect("delete again"));
    }

    #[tokio::test]
    async fn file_backend_persists_between_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("options.json");

        let backend = FileOptionBackend::new(&path);
        assert_eq!(backend.get_option("x").await.expect("missing file"), None);
        assert!(backend.set_option("x", json!({"k": true})).await.expect("set"));
        assert!(backend.set_option("y", json!("v")).await.expect("set"));

        let reopened = FileOptionBackend::new(&path);
        assert_eq!(
            reopened.get_option("x").await.expect("get"),
            Some(json!({"k": true}))
        );
        assert!(reopened.delete_option("x").await.expect("delete"));
        assert_eq!(backend.get_option("x").await.expect("get"), None);
        assert_eq!(backend.get_option("y").await.expect("get"), Some(json!("v")));
    }

    #[tokio::test]
    async fn file_backend_surfaces_corrupt_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("options.json");
        tokio::fs::write(&path, b"{not json").await.expect("write");

        let backend = FileOptionBackend::new(&path);
        let err = backend.get_option("x").await.expect_err("corrupt");
        assert!(matches!(err, BackendError::Serialize { .. }));
    }
}
