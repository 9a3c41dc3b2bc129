//! Field evaluation, array-item recursion and the trim pass.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::custom::{CustomValidator, Verdict};
use crate::descriptor::{FieldDescriptor, Items};
use crate::error::{ConfigError, FieldError};
use crate::messages::ErrorMessages;
use crate::model::{self, ModelLookup, NoModels};
use crate::path;
use crate::types::{json_type_name, TypeName, Vector};
use crate::vectors::{self, is_missing, PatternCache, RuleContext};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Replacement values produced by custom validators, keyed by absolute
/// payload path (`coords[1].lat`).
///
/// Filled by [`Validator::validate`], read by [`Validator::trim`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedValues(BTreeMap<String, Value>);

impl FormattedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, value: Value) {
        self.0.insert(path.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Result of one `validate` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    /// At most one error per descriptor, in descriptor order.
    pub errors: Vec<FieldError>,
    /// Custom-validator replacements for the trim pass.
    pub formatted: FormattedValues,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` with the replacements when valid, `Err` with the errors otherwise.
    pub fn into_result(self) -> Result<FormattedValues, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(self.formatted)
        } else {
            Err(self.errors)
        }
    }
}

/// Validation engine.
///
/// Holds construction-time configuration and a cache of compiled `regex`
/// rules; every call gets its own state, so one instance can serve
/// concurrent calls.
pub struct Validator {
    models: Box<dyn ModelLookup>,
    messages: ErrorMessages,
    custom: HashMap<String, Arc<dyn CustomValidator>>,
    strict_required: bool,
    patterns: PatternCache,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut custom: Vec<_> = self.custom.keys().collect();
        custom.sort();
        f.debug_struct("Validator")
            .field("messages", &self.messages)
            .field("custom", &custom)
            .field("strict_required", &self.strict_required)
            .finish_non_exhaustive()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`Validator`].
pub struct ValidatorBuilder {
    models: Box<dyn ModelLookup>,
    messages: ErrorMessages,
    custom: HashMap<String, Arc<dyn CustomValidator>>,
    strict_required: bool,
}

impl ValidatorBuilder {
    /// Named model registry.
    pub fn models(mut self, models: impl ModelLookup + 'static) -> Self {
        self.models = Box::new(models);
        self
    }

    /// Message schema.
    pub fn messages(mut self, messages: ErrorMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Register a custom validator under `name`.
    pub fn custom(mut self, name: impl Into<String>, validator: impl CustomValidator + 'static) -> Self {
        self.custom.insert(name.into(), Arc::new(validator));
        self
    }

    /// When true (the default), `required` also rejects the empty string.
    pub fn strict_required(mut self, strict: bool) -> Self {
        self.strict_required = strict;
        self
    }

    pub fn build(self) -> Validator {
        Validator {
            models: self.models,
            messages: self.messages,
            custom: self.custom,
            strict_required: self.strict_required,
            patterns: PatternCache::default(),
        }
    }
}

impl Validator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder {
            models: Box::new(NoModels),
            messages: ErrorMessages::default(),
            custom: HashMap::new(),
            strict_required: true,
        }
    }

    /// Validate `payload` against every descriptor.
    ///
    /// Fields are evaluated in order and independently; a failing field
    /// does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed descriptors, unknown models or
    /// unregistered custom validators.
    pub async fn validate(
        &self,
        payload: &Value,
        descriptors: &[FieldDescriptor],
    ) -> Result<Validation, ConfigError> {
        let mut formatted = FormattedValues::new();
        let errors = self
            .validate_in(payload, descriptors, "", &mut formatted)
            .await?;
        debug!(
            fields = descriptors.len(),
            errors = errors.len(),
            "validation finished"
        );
        Ok(Validation { errors, formatted })
    }

    /// Evaluate a single descriptor.
    pub async fn evaluate(
        &self,
        payload: &Value,
        descriptor: &FieldDescriptor,
    ) -> Result<Option<FieldError>, ConfigError> {
        let mut formatted = FormattedValues::new();
        self.evaluate_in(
            payload,
            descriptor,
            std::slice::from_ref(descriptor),
            "",
            &mut formatted,
        )
        .await
    }

    /// Rebuild `payload` keeping only described fields.
    ///
    /// Values recorded in `formatted` replace the originals; absent fields
    /// are left out entirely.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown models or malformed `items`.
    pub fn trim(
        &self,
        payload: &Value,
        descriptors: &[FieldDescriptor],
        formatted: &FormattedValues,
    ) -> Result<Value, ConfigError> {
        self.trim_in(payload, descriptors, "", formatted)
    }

    /// Validate, then trim when valid.
    ///
    /// Returns `Ok(Err(errors))` when the payload is invalid.
    pub async fn sanitize(
        &self,
        payload: &Value,
        descriptors: &[FieldDescriptor],
    ) -> Result<Result<Value, Vec<FieldError>>, ConfigError> {
        match self.validate(payload, descriptors).await?.into_result() {
            Ok(formatted) => Ok(Ok(self.trim(payload, descriptors, &formatted)?)),
            Err(errors) => Ok(Err(errors)),
        }
    }

    fn validate_in<'a>(
        &'a self,
        payload: &'a Value,
        descriptors: &'a [FieldDescriptor],
        prefix: &'a str,
        formatted: &'a mut FormattedValues,
    ) -> BoxFuture<'a, Result<Vec<FieldError>, ConfigError>> {
        Box::pin(async move {
            let mut errors = Vec::new();
            for descriptor in descriptors {
                if let Some(err) = self
                    .evaluate_in(payload, descriptor, descriptors, prefix, formatted)
                    .await?
                {
                    errors.push(err);
                }
            }
            Ok(errors)
        })
    }

    async fn evaluate_in(
        &self,
        payload: &Value,
        descriptor: &FieldDescriptor,
        siblings: &[FieldDescriptor],
        prefix: &str,
        formatted: &mut FormattedValues,
    ) -> Result<Option<FieldError>, ConfigError> {
        let resolved = model::resolve(descriptor, self.models.as_ref())?;
        let d: &FieldDescriptor = &resolved;
        let value = d.path().and_then(|p| path::get(payload, p));
        let abs = absolute(prefix, d.path().unwrap_or(""));

        if d.is_required() && is_missing(value, self.strict_required) {
            debug!(path = %abs, "required field missing");
            let ctx = RuleContext::new(d, value.unwrap_or(&Value::Null));
            return Ok(Some(self.messages.build(
                Vector::Required,
                d.get("required"),
                &ctx,
                None,
            )));
        }
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(None);
        };

        let ctx = RuleContext::new(d, value);
        for (vector, rule) in d.vectors() {
            let failure = match vector {
                Vector::Custom => self.run_custom(rule, &ctx, siblings, &abs, formatted).await?,
                Vector::Items => self.run_items(&ctx, siblings, &abs, formatted).await?,
                other => self.run_check(other, rule, &ctx)?,
            };
            if let Some(err) = failure {
                debug!(path = %abs, vector = %vector, log = %err.log, "rule failed");
                return Ok(Some(err));
            }
        }
        Ok(None)
    }

    fn run_check(
        &self,
        vector: Vector,
        rule: &Value,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<FieldError>, ConfigError> {
        if vectors::check(vector, rule, ctx, self.strict_required, &self.patterns)? {
            Ok(None)
        } else {
            Ok(Some(self.messages.build(vector, Some(rule), ctx, None)))
        }
    }

    async fn run_custom(
        &self,
        rule: &Value,
        ctx: &RuleContext<'_>,
        siblings: &[FieldDescriptor],
        abs: &str,
        formatted: &mut FormattedValues,
    ) -> Result<Option<FieldError>, ConfigError> {
        let name = rule.as_str().ok_or_else(|| ConfigError::InvalidRule {
            path: ctx.descriptor.path_for_errors(),
            vector: Vector::Custom.name(),
            message: format!("expected a validator name, got {}", json_type_name(rule)),
        })?;
        let validator = self
            .custom
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCustomValidator {
                name: name.to_string(),
            })?;

        let verdict = match validator.check(ctx.value, siblings).await {
            Ok(verdict) => verdict,
            Err(err) => {
                error!(validator = name, path = %abs, error = %err, "custom validator failed");
                Verdict::Invalid
            }
        };

        match verdict {
            Verdict::Valid => Ok(None),
            Verdict::Invalid => Ok(Some(self.messages.build(
                Vector::Custom,
                Some(rule),
                ctx,
                None,
            ))),
            Verdict::Replace(value) => {
                formatted.insert(abs, value);
                Ok(None)
            }
        }
    }

    async fn run_items(
        &self,
        ctx: &RuleContext<'_>,
        siblings: &[FieldDescriptor],
        abs: &str,
        formatted: &mut FormattedValues,
    ) -> Result<Option<FieldError>, ConfigError> {
        let d = ctx.descriptor;
        if d.type_name()? != Some(TypeName::Array) {
            return Err(ConfigError::ItemsRequiresArray {
                path: d.path_for_errors(),
            });
        }
        let declared = d.get("type");

        let Some(items) = d.items()? else {
            return Ok(None);
        };

        match items {
            Items::Each(list) => {
                let Value::Array(elements) = ctx.value else {
                    return Ok(Some(self.messages.build(Vector::Type, declared, ctx, None)));
                };
                for (i, element) in elements.iter().enumerate() {
                    let child_errors = if element.is_object() {
                        let child_prefix = format!("{}[{}]", abs, i);
                        self.validate_in(element, &list, &child_prefix, formatted)
                            .await?
                    } else {
                        vec![self.messages.build(Vector::Type, declared, ctx, None)]
                    };
                    if !child_errors.is_empty() {
                        return Ok(Some(self.messages.build(
                            Vector::Items,
                            None,
                            ctx,
                            Some((i, child_errors)),
                        )));
                    }
                }
                Ok(None)
            }
            Items::Every(item) => {
                let item = model::resolve(&item, self.models.as_ref())?;
                if item.contains("items") || item.contains("path") {
                    return Err(ConfigError::NestedItemsInSimpleArray {
                        path: d.path_for_errors(),
                    });
                }
                let Value::Array(elements) = ctx.value else {
                    return Ok(Some(self.messages.build(Vector::Type, declared, ctx, None)));
                };
                for (i, element) in elements.iter().enumerate() {
                    let mut element_ctx = RuleContext::new(d, element);
                    element_ctx.message_vector = Some(Vector::Items);
                    element_ctx.index = Some(i);
                    element_ctx.custom_error = item.custom_error().or(d.custom_error());
                    let element_abs = format!("{}[{}]", abs, i);

                    for (vector, rule) in item.vectors() {
                        let failure = match vector {
                            Vector::Custom => {
                                self.run_custom(rule, &element_ctx, siblings, &element_abs, formatted)
                                    .await?
                            }
                            Vector::Items => None,
                            other => self.run_check(other, rule, &element_ctx)?,
                        };
                        if failure.is_some() {
                            return Ok(failure);
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    fn trim_in(
        &self,
        payload: &Value,
        descriptors: &[FieldDescriptor],
        prefix: &str,
        formatted: &FormattedValues,
    ) -> Result<Value, ConfigError> {
        let mut trimmed = Value::Object(Map::new());

        for descriptor in descriptors {
            let d = model::resolve(descriptor, self.models.as_ref())?;
            let Some(field_path) = d.path().filter(|p| !p.is_empty()) else {
                continue;
            };
            let abs = absolute(prefix, field_path);

            if let Some(replacement) = formatted.get(&abs) {
                path::set(&mut trimmed, field_path, replacement.clone());
                continue;
            }
            let Some(value) = path::get(payload, field_path) else {
                continue;
            };

            match (d.items()?, value) {
                (Some(Items::Each(list)), Value::Array(elements)) => {
                    path::set(&mut trimmed, field_path, Value::Array(Vec::new()));
                    for (i, element) in elements.iter().enumerate() {
                        let child_prefix = format!("{}[{}]", abs, i);
                        let child = self.trim_in(element, &list, &child_prefix, formatted)?;
                        path::set(&mut trimmed, &format!("{}[{}]", field_path, i), child);
                    }
                }
                (Some(Items::Each(_)), _) => {}
                (Some(Items::Every(_)), Value::Array(elements)) => {
                    let copy = elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| {
                            formatted
                                .get(&format!("{}[{}]", abs, i))
                                .unwrap_or(element)
                                .clone()
                        })
                        .collect();
                    path::set(&mut trimmed, field_path, Value::Array(copy));
                }
                (_, value) => path::set(&mut trimmed, field_path, value.clone()),
            }
        }

        Ok(trimmed)
    }
}

/// Join a field path onto the path of the enclosing element.
fn absolute(prefix: &str, field_path: &str) -> String {
    if prefix.is_empty() {
        field_path.to_string()
    } else if field_path.is_empty() || field_path.starts_with('[') {
        format!("{}{}", prefix, field_path)
    } else {
        format!("{}.{}", prefix, field_path)
    }
}
