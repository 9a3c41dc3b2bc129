//! Named models: reusable base descriptors referenced through `model`.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::descriptor::FieldDescriptor;
use crate::error::ConfigError;

/// Read-only lookup of named base descriptors.
///
/// The registry is owned by the caller; the engine only reads from it.
pub trait ModelLookup: Send + Sync {
    fn model(&self, name: &str) -> Option<&FieldDescriptor>;
}

impl ModelLookup for HashMap<String, FieldDescriptor> {
    fn model(&self, name: &str) -> Option<&FieldDescriptor> {
        self.get(name)
    }
}

impl ModelLookup for BTreeMap<String, FieldDescriptor> {
    fn model(&self, name: &str) -> Option<&FieldDescriptor> {
        self.get(name)
    }
}

/// Empty registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModels;

impl ModelLookup for NoModels {
    fn model(&self, _name: &str) -> Option<&FieldDescriptor> {
        None
    }
}

/// Resolve a descriptor's `model` reference.
///
/// Without a `model` key the descriptor is returned as-is. Otherwise the
/// named base is deep-merged with the inline descriptor, inline winning.
///
/// # Errors
///
/// Returns `ConfigError::UnknownModel` if the name is not registered.
pub fn resolve<'a>(
    descriptor: &'a FieldDescriptor,
    models: &dyn ModelLookup,
) -> Result<Cow<'a, FieldDescriptor>, ConfigError> {
    let Some(name) = descriptor.model() else {
        return Ok(Cow::Borrowed(descriptor));
    };
    let base = models
        .model(name)
        .ok_or_else(|| ConfigError::UnknownModel {
            name: name.to_string(),
        })?;

    Ok(Cow::Owned(FieldDescriptor::from(merge_maps(
        base.as_map(),
        descriptor.as_map(),
    ))))
}

/// Recursively merge `overlay` onto `base`.
///
/// - object + object: key-wise; base key order first, new overlay keys appended
/// - array + array: index-wise; `[a, b]` onto `[x, y, z]` gives
///   `[merge(x, a), merge(y, b), z]`, never a concatenation
/// - anything else: the overlay value replaces the base value
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(b), Value::Object(o)) => Value::Object(merge_maps(b, o)),
        (Value::Array(b), Value::Array(o)) => {
            let len = b.len().max(o.len());
            let merged = (0..len)
                .map(|i| match (b.get(i), o.get(i)) {
                    (Some(bv), Some(ov)) => deep_merge(bv, ov),
                    (Some(bv), None) => bv.clone(),
                    (None, Some(ov)) => ov.clone(),
                    (None, None) => Value::Null,
                })
                .collect();
            Value::Array(merged)
        }
        (_, other) => other.clone(),
    }
}

fn merge_maps(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();
    for (key, value) in overlay {
        let merged = match result.get(key) {
            Some(existing) => deep_merge(existing, value),
            None => value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}
