//! Field descriptors: declarative rules for one payload location.
//!
//! A descriptor is an ordered JSON object. Keys naming a [`Vector`] are
//! active rules and run in the order they were written; the remaining keys
//! (`path`, `label`, `onError`, ...) are metadata.
//!
//! ```
//! use pineapple::FieldDescriptor;
//! use serde_json::json;
//!
//! let descriptor = FieldDescriptor::from_value(json!({
//!     "path": "user.name",
//!     "label": "Name",
//!     "required": true,
//!     "type": "String",
//!     "length": { "min": 3, "max": 100 }
//! }))
//! .unwrap();
//!
//! assert_eq!(descriptor.path(), Some("user.name"));
//! let rules: Vec<_> = descriptor.vectors().map(|(v, _)| v.name()).collect();
//! assert_eq!(rules, ["required", "type", "length"]);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::types::{json_type_name, TypeName, Vector};

/// Rules for one payload field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldDescriptor(Map<String, Value>);

/// Sub-schema for array elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    /// Array of objects: every element is validated against this list.
    Each(Vec<FieldDescriptor>),
    /// Array of simple values: this descriptor's rules run per element.
    Every(FieldDescriptor),
}

impl FieldDescriptor {
    /// Build a descriptor from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDescriptor` if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ConfigError::InvalidDescriptor {
                actual: json_type_name(&other).to_string(),
            }),
        }
    }

    /// Build a descriptor list from a JSON array of objects.
    pub fn list_from_value(value: Value) -> Result<Vec<Self>, ConfigError> {
        match value {
            Value::Array(arr) => arr.into_iter().map(Self::from_value).collect(),
            other => Err(ConfigError::InvalidDescriptor {
                actual: json_type_name(&other).to_string(),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Payload location; falls back to the `key` alias.
    pub fn path(&self) -> Option<&str> {
        self.str_key("path").or_else(|| self.str_key("key"))
    }

    pub fn label(&self) -> Option<&str> {
        self.str_key("label")
    }

    /// Label used in messages: `label`, else `path`, else empty.
    pub fn display_label(&self) -> &str {
        self.label().or_else(|| self.path()).unwrap_or("")
    }

    pub fn model(&self) -> Option<&str> {
        self.str_key("model")
    }

    pub fn is_required(&self) -> bool {
        self.0.get("required").is_some_and(truthy)
    }

    /// Field-level message override for a vector name.
    pub fn on_error(&self, name: &str) -> Option<&str> {
        self.0.get("onError")?.get(name)?.as_str()
    }

    pub fn custom_error(&self) -> Option<&str> {
        self.str_key("customError")
    }

    /// Active rules in declaration order.
    pub fn vectors(&self) -> impl Iterator<Item = (Vector, &Value)> + '_ {
        self.0
            .iter()
            .filter_map(|(k, v)| Vector::parse(k).map(|vector| (vector, v)))
    }

    /// Declared `type`, parsed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownType` for unknown names or non-string values.
    pub fn type_name(&self) -> Result<Option<TypeName>, ConfigError> {
        self.0
            .get("type")
            .map(|rule| TypeName::from_rule(rule, self.path_for_errors()))
            .transpose()
    }

    /// The `items` sub-schema, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRule` when `items` is neither a list of
    /// objects nor an object.
    pub fn items(&self) -> Result<Option<Items>, ConfigError> {
        match self.0.get("items") {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Items::Every(Self(map.clone())))),
            Some(Value::Array(arr)) => arr
                .iter()
                .map(|v| match v {
                    Value::Object(map) => Ok(Self(map.clone())),
                    other => Err(self.invalid_items(other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|list| Some(Items::Each(list))),
            Some(other) => Err(self.invalid_items(other)),
        }
    }

    fn invalid_items(&self, got: &Value) -> ConfigError {
        ConfigError::InvalidRule {
            path: self.path_for_errors(),
            vector: Vector::Items.name(),
            message: format!(
                "expected a list of descriptors or a descriptor, got {}",
                json_type_name(got)
            ),
        }
    }

    /// Path text used inside configuration errors.
    pub(crate) fn path_for_errors(&self) -> String {
        self.path().unwrap_or("<no path>").to_string()
    }

    fn str_key(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl TryFrom<Value> for FieldDescriptor {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Map<String, Value>> for FieldDescriptor {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Loose truthiness for flag-like keys such as `required`.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
