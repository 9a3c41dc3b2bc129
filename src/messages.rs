//! Error-message templates and construction of [`FieldError`] values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FieldError;
use crate::types::{display_string, Vector};
use crate::vectors::RuleContext;

/// Built-in templates, used when neither the field nor the configured
/// schema has a message for a vector.
const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("required", "$label is required"),
    ("length", "$label has invalid length"),
    ("regex", "$label has invalid format"),
    ("type", "$label invalid type"),
    ("oneOf", "$label invalid option"),
    ("canParse", "$label invalid parsing"),
    ("gt", "$label must be greater than $value"),
    ("gte", "$label must be greater than or equal to $value"),
    ("lt", "$label must be less than $value"),
    ("lte", "$label must be less than or equal to $value"),
    ("items", "one of the $label items is invalid"),
    ("custom", "rejected by custom validator"),
];

/// Message schema: marker tokens and per-vector default templates.
///
/// Every key is optional when deserializing; templates missing from
/// `onError` fall back to the built-in ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorMessages {
    /// Replaced with the field label.
    pub marker: String,
    /// Replaced with the rule's configured value (bound, length, options).
    pub value_marker: String,
    /// Replaced with the descriptor's `customError` text.
    pub custom_error_marker: String,
    /// Vector name to template.
    pub on_error: BTreeMap<String, String>,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            marker: "$label".to_string(),
            value_marker: "$value".to_string(),
            custom_error_marker: "$customError".to_string(),
            on_error: BTreeMap::new(),
        }
    }
}

impl ErrorMessages {
    /// Override the template for one vector.
    pub fn with_template(mut self, vector: Vector, template: impl Into<String>) -> Self {
        self.on_error.insert(vector.name().to_string(), template.into());
        self
    }

    /// Schema-level template for a vector name.
    pub fn template(&self, name: &str) -> &str {
        self.on_error
            .get(name)
            .map(String::as_str)
            .or_else(|| {
                DEFAULT_MESSAGES
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| *v)
            })
            .unwrap_or("")
    }

    /// Build the error for a failed `vector`.
    ///
    /// `rule` is the rule's configured value, substituted for the value
    /// marker. `nested` carries the failing element index and its child
    /// errors when an array of objects failed.
    pub(crate) fn build(
        &self,
        vector: Vector,
        rule: Option<&Value>,
        ctx: &RuleContext<'_>,
        nested: Option<(usize, Vec<FieldError>)>,
    ) -> FieldError {
        let label = ctx.descriptor.display_label().to_string();
        let lookup = ctx.message_vector.unwrap_or(vector);

        let template = ctx
            .descriptor
            .on_error(lookup.name())
            .or_else(|| match lookup {
                Vector::Custom => ctx.custom_error,
                _ => None,
            })
            .unwrap_or_else(|| self.template(lookup.name()));

        let message = self.render(template, &label, rule, ctx.custom_error);

        let mut log = format!("_{}", vector.name());
        if let Some(index) = ctx.index {
            log.push_str(&format!(" @index({})", index));
        }
        let errors = match nested {
            Some((index, errors)) => {
                log.push_str(&format!(" @index({})", index));
                errors
            }
            None => Vec::new(),
        };

        FieldError {
            label,
            path: ctx.descriptor.path().map(String::from),
            message,
            log,
            errors,
        }
    }

    fn render(
        &self,
        template: &str,
        label: &str,
        rule: Option<&Value>,
        custom_error: Option<&str>,
    ) -> String {
        let mut message = template.replace(&self.marker, label);
        if !self.value_marker.is_empty() {
            let value = rule.map(rule_text).unwrap_or_default();
            message = message.replace(&self.value_marker, &value);
        }
        if !self.custom_error_marker.is_empty() {
            message = message.replace(&self.custom_error_marker, custom_error.unwrap_or(""));
        }
        message
    }
}

/// Text for a rule value inside a message: `3`, `en, ar`, `min 3, max 100`.
fn rule_text(rule: &Value) -> String {
    match rule {
        Value::Array(arr) => arr.iter().map(display_string).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{} {}", k, display_string(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => display_string(other),
    }
}
