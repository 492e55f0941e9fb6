//! Setting definitions, the mutable registry and the frozen schema.
//!
//! # Design
//! - Definitions are registered before the service starts; `freeze` runs the
//!   queued extension callbacks and returns an immutable [`Schema`].
//! - A definition's default must match its declared kind, otherwise the
//!   registration is rejected.
//! - Kinds form a closed set; text that names any other kind does not parse.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ConfigError, ConfigResult};
use crate::snapshot::SettingsSnapshot;

/// Declared value type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    /// `true` / `false`.
    Boolean,
    /// Non-negative integer stored as `i64`.
    Integer,
    /// Plain text.
    String,
}

impl SettingKind {
    /// Stable lowercase name used in schema documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::String => "string",
        }
    }

    /// Whether `value` is of this kind. Negative integers never match.
    #[must_use]
    pub const fn matches(self, value: &SettingValue) -> bool {
        match (self, value) {
            (Self::Integer, SettingValue::Int(number)) => *number >= 0,
            (Self::Boolean, SettingValue::Bool(_)) | (Self::String, SettingValue::String(_)) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "boolean" => Ok(Self::Boolean),
            "integer" => Ok(Self::Integer),
            "string" => Ok(Self::String),
            other => Err(ConfigError::UnknownKind {
                value: other.to_string(),
            }),
        }
    }
}

/// A typed setting value. Serialises as the bare JSON scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean value; listed first so JSON booleans never land in another arm.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Text value.
    String(String),
}

impl SettingValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> SettingKind {
        match self {
            Self::Bool(_) => SettingKind::Boolean,
            Self::Int(_) => SettingKind::Integer,
            Self::String(_) => SettingKind::String,
        }
    }

    /// Strictly read a JSON value as `kind`; no coercion is attempted.
    #[must_use]
    pub fn from_json(value: &Value, kind: SettingKind) -> Option<Self> {
        match (kind, value) {
            (SettingKind::Boolean, Value::Bool(flag)) => Some(Self::Bool(*flag)),
            (SettingKind::Integer, Value::Number(number)) => number
                .as_u64()
                .and_then(|unsigned| i64::try_from(unsigned).ok())
                .map(Self::Int),
            (SettingKind::String, Value::String(text)) => Some(Self::String(text.clone())),
            _ => None,
        }
    }

    /// JSON representation.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int(number) => Value::from(*number),
            Self::String(text) => Value::String(text.clone()),
        }
    }

    /// Boolean payload, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(number) => Some(*number),
            _ => None,
        }
    }

    /// Text payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Custom coercion for one key. Returning `None` keeps the current value.
pub type SanitizeRule = Arc<dyn Fn(&Value) -> Option<SettingValue> + Send + Sync>;

/// Callback that may add or replace definitions before the schema is frozen.
pub type SchemaExtension = Box<dyn FnOnce(&mut Vec<SettingDefinition>) + Send>;

/// Metadata for one recognised setting.
#[derive(Clone)]
pub struct SettingDefinition {
    key: String,
    kind: SettingKind,
    default: SettingValue,
    rule: Option<SanitizeRule>,
}

impl SettingDefinition {
    /// Build a definition of an explicit kind.
    #[must_use]
    pub fn new(key: impl Into<String>, kind: SettingKind, default: SettingValue) -> Self {
        Self {
            key: key.into(),
            kind,
            default,
            rule: None,
        }
    }

    /// Boolean setting.
    #[must_use]
    pub fn boolean(key: impl Into<String>, default: bool) -> Self {
        Self::new(key, SettingKind::Boolean, SettingValue::Bool(default))
    }

    /// Integer setting.
    #[must_use]
    pub fn integer(key: impl Into<String>, default: i64) -> Self {
        Self::new(key, SettingKind::Integer, SettingValue::Int(default))
    }

    /// Text setting.
    #[must_use]
    pub fn string(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(key, SettingKind::String, SettingValue::String(default.into()))
    }

    /// Attach a custom sanitisation rule that replaces kind-based coercion.
    #[must_use]
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Value) -> Option<SettingValue> + Send + Sync + 'static,
    {
        self.rule = Some(Arc::new(rule));
        self
    }

    /// Setting key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared kind.
    #[must_use]
    pub const fn kind(&self) -> SettingKind {
        self.kind
    }

    /// Default value.
    #[must_use]
    pub const fn default_value(&self) -> &SettingValue {
        &self.default
    }

    /// Custom rule, when one was attached.
    #[must_use]
    pub fn rule(&self) -> Option<&SanitizeRule> {
        self.rule.as_ref()
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.kind.matches(&self.default) {
            Ok(())
        } else {
            Err(ConfigError::InvalidDefault {
                key: self.key.clone(),
                expected: self.kind.as_str(),
            })
        }
    }
}

impl fmt::Debug for SettingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingDefinition")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("rule", &self.rule.is_some())
            .finish()
    }
}

/// Mutable collection of definitions used during startup.
#[derive(Default)]
pub struct SchemaRegistry {
    definitions: Vec<SettingDefinition>,
    extensions: Vec<SchemaExtension>,
}

impl SchemaRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register definitions. A key registered twice keeps the later definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDefault`] when a default does not match its kind;
    /// nothing from the batch is registered in that case.
    pub fn register(
        &mut self,
        definitions: impl IntoIterator<Item = SettingDefinition>,
    ) -> ConfigResult<()> {
        let batch: Vec<SettingDefinition> = definitions.into_iter().collect();
        for definition in &batch {
            definition.validate()?;
        }
        for definition in batch {
            upsert(&mut self.definitions, definition);
        }
        Ok(())
    }

    /// Queue an extension callback; callbacks run in order during [`Self::freeze`].
    pub fn extend<F>(&mut self, extension: F)
    where
        F: FnOnce(&mut Vec<SettingDefinition>) + Send + 'static,
    {
        self.extensions.push(Box::new(extension));
    }

    /// Number of definitions registered so far, extensions excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no definitions have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Run extensions and produce the immutable schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDefault`] when an extension introduced a
    /// definition whose default does not match its kind.
    pub fn freeze(self) -> ConfigResult<Schema> {
        let Self {
            mut definitions,
            extensions,
        } = self;
        for extension in extensions {
            extension(&mut definitions);
        }

        let mut by_key = BTreeMap::new();
        for definition in definitions {
            definition.validate()?;
            by_key.insert(definition.key.clone(), definition);
        }
        Ok(Schema {
            definitions: Arc::new(by_key),
        })
    }
}

fn upsert(definitions: &mut Vec<SettingDefinition>, definition: SettingDefinition) {
    if let Some(slot) = definitions
        .iter_mut()
        .find(|existing| existing.key == definition.key)
    {
        *slot = definition;
    } else {
        definitions.push(definition);
    }
}

/// Frozen, cheaply cloneable set of definitions.
#[derive(Debug, Clone)]
pub struct Schema {
    definitions: Arc<BTreeMap<String, SettingDefinition>>,
}

impl Schema {
    /// Fresh snapshot holding every key at its default.
    #[must_use]
    pub fn defaults(&self) -> SettingsSnapshot {
        self.definitions
            .values()
            .map(|definition| (definition.key.clone(), definition.default.clone()))
            .collect()
    }

    /// Definition for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] when the key is not recognised.
    pub fn get(&self, key: &str) -> ConfigResult<&SettingDefinition> {
        self.definitions
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey {
                key: key.to_string(),
            })
    }

    /// Whether `key` is recognised.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    /// Definitions in key order.
    pub fn definitions(&self) -> impl Iterator<Item = &SettingDefinition> {
        self.definitions.values()
    }

    /// Recognised keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Number of recognised keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the schema has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// JSON-schema style description of the settings object.
    #[must_use]
    pub fn describe(&self) -> Value {
        let properties: Map<String, Value> = self
            .definitions
            .values()
            .map(|definition| {
                (
                    definition.key.clone(),
                    json!({
                        "type": definition.kind.as_str(),
                        "default": definition.default.to_json(),
                    }),
                )
            })
            .collect();
        json!({
            "type": "object",
            "properties": properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = SchemaRegistry::new();
        registry
            .register([SettingDefinition::boolean("flag", true)])
            .expect("register");
        registry
            .register([SettingDefinition::integer("flag", 3)])
            .expect("re-register");
        assert_eq!(registry.len(), 1);

        let schema = registry.freeze().expect("freeze");
        let definition = schema.get("flag").expect("flag");
        assert_eq!(definition.kind(), SettingKind::Integer);
        assert_eq!(definition.default_value(), &SettingValue::Int(3));
    }

    #[test]
    fn mismatched_default_is_rejected_atomically() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register([
                SettingDefinition::boolean("ok", false),
                SettingDefinition::new("bad", SettingKind::Integer, SettingValue::from("x")),
            ])
            .expect_err("mismatch");
        assert!(matches!(
            err,
            ConfigError::InvalidDefault { ref key, expected: "integer" } if key == "bad"
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn extensions_run_in_order_and_are_validated() {
        let mut registry = SchemaRegistry::new();
        registry
            .register([SettingDefinition::string("title", "a")])
            .expect("register");
        registry.extend(|defs| defs.push(SettingDefinition::integer("limit", 10)));
        registry.extend(|defs| {
            for def in defs.iter_mut() {
                if def.key() == "limit" {
                    *def = SettingDefinition::integer("limit", 20);
                }
            }
        });
        let schema = registry.freeze().expect("freeze");
        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.get("limit").expect("limit").default_value(),
            &SettingValue::Int(20)
        );

        let mut broken = SchemaRegistry::new();
        broken.extend(|defs| {
            defs.push(SettingDefinition::new(
                "oops",
                SettingKind::Boolean,
                SettingValue::Int(1),
            ));
        });
        assert!(broken.freeze().is_err());
    }

    #[test]
    fn keys_are_case_sensitive() {
        let mut registry = SchemaRegistry::new();
        registry
            .register([SettingDefinition::boolean("debug_enableMode", false)])
            .expect("register");
        let schema = registry.freeze().expect("freeze");
        assert!(schema.get("debug_enableMode").is_ok());
        assert!(matches!(
            schema.get("debug_enablemode"),
            Err(ConfigError::UnknownKey { .. })
        ));
    }

    #[test]
    fn kind_parsing_rejects_unknown_names() {
        assert_eq!("boolean".parse::<SettingKind>().ok(), Some(SettingKind::Boolean));
        assert_eq!("integer".parse::<SettingKind>().ok(), Some(SettingKind::Integer));
        assert_eq!("string".parse::<SettingKind>().ok(), Some(SettingKind::String));
        assert!(matches!(
            "array".parse::<SettingKind>(),
            Err(ConfigError::UnknownKind { ref value }) if value == "array"
        ));
    }

    #[test]
    fn values_serialise_as_bare_json() {
        assert_eq!(
            serde_json::to_value(SettingValue::Bool(true)).expect("json"),
            json!(true)
        );
        assert_eq!(
            serde_json::to_value(SettingValue::Int(7)).expect("json"),
            json!(7)
        );
        let parsed: SettingValue = serde_json::from_value(json!(false)).expect("parse");
        assert_eq!(parsed, SettingValue::Bool(false));
    }

    #[test]
    fn from_json_is_strict() {
        assert_eq!(
            SettingValue::from_json(&json!("1"), SettingKind::Boolean),
            None
        );
        assert_eq!(
            SettingValue::from_json(&json!(1.5), SettingKind::Integer),
            None
        );
        assert_eq!(
            SettingValue::from_json(&json!(-4), SettingKind::Integer),
            None
        );
        assert_eq!(
            SettingValue::from_json(&json!(4), SettingKind::Integer),
            Some(SettingValue::Int(4))
        );
    }

    #[test]
    fn integer_kind_rejects_negative_values() {
        assert!(SettingKind::Integer.matches(&SettingValue::Int(0)));
        assert!(!SettingKind::Integer.matches(&SettingValue::Int(-3)));

        let mut registry = SchemaRegistry::new();
        let err = registry
            .register([SettingDefinition::integer("offset", -1)])
            .expect_err("negative default");
        assert!(matches!(
            err,
            ConfigError::InvalidDefault { expected: "integer", .. }
        ));
    }

    #[test]
    fn describe_lists_every_property() {
        let mut registry = SchemaRegistry::new();
        registry
            .register([
                SettingDefinition::boolean("a", true),
                SettingDefinition::string("b", "x"),
            ])
            .expect("register");
        let schema = registry.freeze().expect("freeze");
        assert_eq!(
            schema.describe(),
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "boolean", "default": true},
                    "b": {"type": "string", "default": "x"}
                }
            })
        );
    }
}
