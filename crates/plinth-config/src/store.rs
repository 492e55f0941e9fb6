//! Cached settings store over an [`OptionBackend`].
//!
//! # Design
//! - Reads resolve `defaults ⊕ persisted` and are cached until the next write.
//! - A backend failure on read degrades to schema defaults and is not cached.
//! - Every write bumps a generation counter; a read that started before the
//!   bump never fills the cache.
//! - Writes overwrite the whole blob; concurrent writers race and the last
//!   write wins.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::OptionBackend;
use crate::defaults::SETTINGS_OPTION_NAME;
use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Schema, SettingValue};
use crate::snapshot::SettingsSnapshot;

/// Callback invoked with the freshly persisted snapshot after each save.
pub type ChangeListener = Box<dyn Fn(&SettingsSnapshot) + Send + Sync>;

/// Typed read-through / write-through access to the settings option.
pub struct SettingsStore {
    schema: Schema,
    backend: Arc<dyn OptionBackend>,
    cache: RwLock<Option<SettingsSnapshot>>,
    generation: AtomicU64,
    listeners: Vec<ChangeListener>,
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("schema", &self.schema)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Store for `schema`, persisting through `backend`.
    #[must_use]
    pub fn new(schema: Schema, backend: Arc<dyn OptionBackend>) -> Self {
        Self {
            schema,
            backend,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
            listeners: Vec::new(),
        }
    }

    /// Register a listener run, in registration order, after every successful save.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: Fn(&SettingsSnapshot) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Frozen schema backing this store.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Backend the store persists through.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn OptionBackend> {
        Arc::clone(&self.backend)
    }

    /// Resolve the current settings. Never fails; see the module docs.
    pub async fn load(&self) -> SettingsSnapshot {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return cached.clone();
        }

        let generation = self.generation.load(Ordering::Acquire);
        match self.backend.get_option(SETTINGS_OPTION_NAME).await {
            Ok(blob) => {
                let snapshot = self.merge(blob.as_ref());
                let mut cache = self.cache.write().await;
                if self.generation.load(Ordering::Acquire) == generation {
                    *cache = Some(snapshot.clone());
                } else {
                    debug!("settings changed during read; not caching");
                }
                drop(cache);
                snapshot
            }
            Err(err) => {
                warn!(error = %err, "settings backend unavailable; serving defaults");
                self.schema.defaults()
            }
        }
    }

    /// Current value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] when the key is not in the schema.
    pub async fn get(&self, key: &str) -> ConfigResult<SettingValue> {
        let definition = self.schema.get(key)?;
        let snapshot = self.load().await;
        Ok(snapshot
            .get(key)
            .cloned()
            .unwrap_or_else(|| definition.default_value().clone()))
    }

    /// Overwrite the persisted blob with `snapshot` and return the reloaded state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Backend`] when the write fails.
    pub async fn save(&self, snapshot: &SettingsSnapshot) -> ConfigResult<SettingsSnapshot> {
        let blob = self.persistable(snapshot);
        let changed = self
            .backend
            .set_option(SETTINGS_OPTION_NAME, blob)
            .await
            .map_err(|source| ConfigError::Backend {
                operation: "save_settings",
                source,
            })?;
        debug!(changed, "settings saved");

        self.invalidate().await;
        let saved = self.load().await;
        for listener in &self.listeners {
            listener(&saved);
        }
        Ok(saved)
    }

    /// Replace a single key, keeping every other value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] or [`ConfigError::TypeMismatch`] for
    /// invalid input (negative integers included), and [`ConfigError::Backend`] when the write fails.
    pub async fn update(&self, key: &str, value: SettingValue) -> ConfigResult<SettingsSnapshot> {
        let definition = self.schema.get(key)?;
        if !definition.kind().matches(&value) {
            return Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: definition.kind().as_str(),
            });
        }
        let mut snapshot = self.load().await;
        snapshot.insert(key, value);
        self.save(&snapshot).await
    }

    /// Persist every schema key, filling gaps in the stored blob with defaults.
    ///
    /// Unlike [`Self::load`], a read failure is reported instead of masked so
    /// stored values are never replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Backend`] when reading or writing fails.
    pub async fn seed_defaults(&self) -> ConfigResult<SettingsSnapshot> {
        let blob = self
            .backend
            .get_option(SETTINGS_OPTION_NAME)
            .await
            .map_err(|source| ConfigError::Backend {
                operation: "seed_defaults",
                source,
            })?;
        let snapshot = self.merge(blob.as_ref());
        let saved = self.save(&snapshot).await?;
        info!(keys = saved.len(), "settings defaults seeded");
        Ok(saved)
    }

    /// Delete the persisted settings. Returns `true` when something was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Backend`] when the delete fails.
    pub async fn purge(&self) -> ConfigResult<bool> {
        let removed = self
            .backend
            .delete_option(SETTINGS_OPTION_NAME)
            .await
            .map_err(|source| ConfigError::Backend {
                operation: "purge_settings",
                source,
            })?;
        self.invalidate().await;
        Ok(removed)
    }

    /// Drop the cached snapshot so the next read hits the backend.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *cache = None;
    }

    fn merge(&self, blob: Option<&Value>) -> SettingsSnapshot {
        let mut snapshot = self.schema.defaults();
        let Some(Value::Object(persisted)) = blob else {
            return snapshot;
        };
        for definition in self.schema.definitions() {
            let Some(raw) = persisted.get(definition.key()) else {
                continue;
            };
            match SettingValue::from_json(raw, definition.kind()) {
                Some(value) => {
                    snapshot.insert(definition.key(), value);
                }
                None => {
                    debug!(key = definition.key(), "persisted value has wrong type; using default");
                }
            }
        }
        snapshot
    }

    fn persistable(&self, snapshot: &SettingsSnapshot) -> Value {
        snapshot
            .iter()
            .filter(|(key, value)| {
                self.schema
                    .get(key)
                    .is_ok_and(|definition| definition.kind().matches(value))
            })
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<SettingsSnapshot>()
            .to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryOptionBackend;
    use crate::defaults::{DEBUG_MODE_KEY, ENABLE_FEATURE_KEY, EXAMPLE_TEXT_KEY, builtin_schema};
    use crate::error::BackendError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Notify;

    struct FailingBackend;

    #[async_trait]
    impl OptionBackend for FailingBackend {
        async fn get_option(&self, name: &str) -> Result<Option<Value>, BackendError> {
            Err(BackendError::Rejected {
                name: name.to_string(),
            })
        }

        async fn set_option(&self, name: &str, _value: Value) -> Result<bool, BackendError> {
            Err(BackendError::Rejected {
                name: name.to_string(),
            })
        }

        async fn delete_option(&self, name: &str) -> Result<bool, BackendError> {
            Err(BackendError::Rejected {
                name: name.to_string(),
            })
        }
    }

    /// Parks its first read after fetching, until `release` is notified.
    struct ParkedFirstRead {
        inner: MemoryOptionBackend,
        parked: AtomicBool,
        fetched: Notify,
        release: Notify,
    }

    #[async_trait]
    impl OptionBackend for ParkedFirstRead {
        async fn get_option(&self, name: &str) -> Result<Option<Value>, BackendError> {
            let value = self.inner.get_option(name).await?;
            if !self.parked.swap(true, Ordering::SeqCst) {
                self.fetched.notify_one();
                self.release.notified().await;
            }
            Ok(value)
        }

        async fn set_option(&self, name: &str, value: Value) -> Result<bool, BackendError> {
            self.inner.set_option(name, value).await
        }

        async fn delete_option(&self, name: &str) -> Result<bool, BackendError> {
            self.inner.delete_option(name).await
        }
    }

    fn store_with(blob: Option<Value>) -> (SettingsStore, Arc<MemoryOptionBackend>) {
        let backend = Arc::new(MemoryOptionBackend::with_options(
            blob.map(|value| (SETTINGS_OPTION_NAME.to_string(), value)),
        ));
        let store = SettingsStore::new(builtin_schema().expect("schema"), backend.clone());
        (store, backend)
    }

    #[tokio::test]
    async fn load_fills_missing_keys_and_drops_unknown() {
        let (store, _) = store_with(Some(json!({
            "global_enableFeature": false,
            "legacy_key": "gone",
        })));
        let snapshot = store.load().await;
        assert_eq!(snapshot.keys().count(), 4);
        assert_eq!(snapshot.get(ENABLE_FEATURE_KEY), Some(&SettingValue::Bool(false)));
        assert!(snapshot.get("legacy_key").is_none());
    }

    #[tokio::test]
    async fn load_tolerates_garbage_blobs() {
        for blob in [json!("corrupt"), json!([1, 2]), json!(null)] {
            let (store, _) = store_with(Some(blob));
            assert_eq!(store.load().await, store.schema().defaults());
        }
    }

    #[tokio::test]
    async fn mistyped_persisted_values_fall_back_to_default() {
        let (store, _) = store_with(Some(json!({
            "global_enableFeature": "no",
            "global_exampleText": 5,
        })));
        assert_eq!(store.load().await, store.schema().defaults());
    }

    #[tokio::test]
    async fn backend_failure_serves_defaults_without_caching() {
        let store = SettingsStore::new(builtin_schema().expect("schema"), Arc::new(FailingBackend));
        assert_eq!(store.load().await, store.schema().defaults());
        assert!(store.cache.read().await.is_none());

        let err = store
            .save(&store.schema().defaults())
            .await
            .expect_err("save fails");
        assert!(matches!(err, ConfigError::Backend { operation: "save_settings", .. }));
        assert!(store.seed_defaults().await.is_err());
    }

    #[tokio::test]
    async fn save_reloads_and_notifies_listeners() {
        let (mut store, backend) = store_with(None);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        store.on_change(move |snapshot| {
            assert!(snapshot.flag(DEBUG_MODE_KEY));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let mut next = store.load().await;
        next.insert(DEBUG_MODE_KEY, SettingValue::Bool(true));
        next.insert("ignored", SettingValue::Int(1));
        let saved = store.save(&next).await.expect("save");

        assert!(saved.flag(DEBUG_MODE_KEY));
        assert!(saved.get("ignored").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let blob = backend
            .get_option(SETTINGS_OPTION_NAME)
            .await
            .expect("get")
            .expect("blob");
        assert_eq!(blob[DEBUG_MODE_KEY], json!(true));
        assert!(blob.get("ignored").is_none());
    }

    #[tokio::test]
    async fn update_checks_key_and_kind() {
        let (store, _) = store_with(None);
        let saved = store
            .update(EXAMPLE_TEXT_KEY, SettingValue::from("hi"))
            .await
            .expect("update");
        assert_eq!(saved.get(EXAMPLE_TEXT_KEY), Some(&SettingValue::from("hi")));
        assert_eq!(
            store.get(ENABLE_FEATURE_KEY).await.expect("get"),
            SettingValue::Bool(true)
        );

        assert!(matches!(
            store.update("nope", SettingValue::Bool(true)).await,
            Err(ConfigError::UnknownKey { .. })
        ));
        assert!(matches!(
            store.update(ENABLE_FEATURE_KEY, SettingValue::Int(1)).await,
            Err(ConfigError::TypeMismatch { expected: "boolean", .. })
        ));
        assert!(matches!(
            store.update(EXAMPLE_TEXT_KEY, SettingValue::Int(3)).await,
            Err(ConfigError::TypeMismatch { expected: "string", .. })
        ));
        assert!(matches!(
            store.get("nope").await,
            Err(ConfigError::UnknownKey { .. })
        ));
    }

    #[tokio::test]
    async fn seed_keeps_stored_values_and_purge_removes_them() {
        let (store, backend) = store_with(Some(json!({"global_exampleText": "kept"})));
        let seeded = store.seed_defaults().await.expect("seed");
        assert_eq!(seeded.get(EXAMPLE_TEXT_KEY), Some(&SettingValue::from("kept")));
        let blob = backend
            .get_option(SETTINGS_OPTION_NAME)
            .await
            .expect("get")
            .expect("blob");
        assert_eq!(blob.as_object().map(serde_json::Map::len), Some(4));

        assert!(store.purge().await.expect("purge"));
        assert!(!store.purge().await.expect("purge again"));
        assert_eq!(store.load().await, store.schema().defaults());
    }

    #[tokio::test]
    async fn read_in_flight_during_save_does_not_cache_old_blob() {
        let backend = Arc::new(ParkedFirstRead {
            inner: MemoryOptionBackend::new(),
            parked: AtomicBool::new(false),
            fetched: Notify::new(),
            release: Notify::new(),
        });
        let store = Arc::new(SettingsStore::new(
            builtin_schema().expect("schema"),
            backend.clone(),
        ));

        let reader = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load().await }
        });
        backend.fetched.notified().await;

        let mut next = store.schema().defaults();
        next.insert(EXAMPLE_TEXT_KEY, SettingValue::from("new"));
        let saved = store.save(&next).await.expect("save");
        assert_eq!(saved.get(EXAMPLE_TEXT_KEY), Some(&SettingValue::from("new")));

        backend.release.notify_one();
        let stale = reader.await.expect("reader");
        assert_eq!(stale, store.schema().defaults());

        assert_eq!(
            store.load().await.get(EXAMPLE_TEXT_KEY),
            Some(&SettingValue::from("new"))
        );
    }

    #[tokio::test]
    async fn negative_integers_are_not_persisted() {
        let mut registry = crate::defaults::builtin_registry().expect("registry");
        registry
            .register([crate::schema::SettingDefinition::integer("global_limit", 10)])
            .expect("register");
        let backend = Arc::new(MemoryOptionBackend::with_options([(
            SETTINGS_OPTION_NAME.to_string(),
            json!({"global_limit": -4}),
        )]));
        let store = SettingsStore::new(registry.freeze().expect("freeze"), backend);

        assert_eq!(store.get("global_limit").await.expect("get"), SettingValue::Int(10));
        assert!(matches!(
            store.update("global_limit", SettingValue::Int(-3)).await,
            Err(ConfigError::TypeMismatch { expected: "integer", .. })
        ));
        let saved = store
            .update("global_limit", SettingValue::Int(3))
            .await
            .expect("update");
        assert_eq!(saved.get("global_limit"), Some(&SettingValue::Int(3)));
    }
}
