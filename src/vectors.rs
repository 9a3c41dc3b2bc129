//! Built-in rule evaluators.
//!
//! [`check`] is the registry: one arm per [`Vector`]. `custom` and `items`
//! need the engine (async validators, recursion) and are dispatched there.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use fancy_regex::Regex;
use serde_json::Value;
use tracing::{trace, warn};

use crate::descriptor::{truthy, FieldDescriptor};
use crate::error::ConfigError;
use crate::types::{
    compile_pattern, display_string, json_type_name, regex_literal, strict_eq, to_number,
    ParseKind, TypeName, Vector,
};

/// Per-evaluation view of a field.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    /// Descriptor supplying label, path and message overrides.
    pub descriptor: &'a FieldDescriptor,
    /// Value under test.
    pub value: &'a Value,
    /// Vector name used for message lookup instead of the failing one.
    pub message_vector: Option<Vector>,
    /// Position within the enclosing array.
    pub index: Option<usize>,
    /// `customError` text of the descriptor owning the rule.
    pub custom_error: Option<&'a str>,
}

impl<'a> RuleContext<'a> {
    pub fn new(descriptor: &'a FieldDescriptor, value: &'a Value) -> Self {
        Self {
            descriptor,
            value,
            message_vector: None,
            index: None,
            custom_error: descriptor.custom_error(),
        }
    }

    fn path(&self) -> String {
        self.descriptor.path_for_errors()
    }
}

/// Compiled `regex` rules keyed by their rule text.
///
/// Shared by every call on a validator, so a pattern applied to each
/// element of an array compiles once.
#[derive(Debug, Default)]
pub struct PatternCache(Mutex<HashMap<String, Arc<Regex>>>);

impl PatternCache {
    /// Compile `rule` (plain source or `/source/flags`), reusing an earlier
    /// compilation of the same text.
    pub fn compile(&self, rule: &str) -> Result<Arc<Regex>, fancy_regex::Error> {
        let mut cache = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pattern) = cache.get(rule) {
            return Ok(Arc::clone(pattern));
        }
        let (source, flags) = regex_literal(rule).unwrap_or((rule, ""));
        let pattern = Arc::new(compile_pattern(source, flags)?);
        trace!(rule, "compiled pattern");
        cache.insert(rule.to_string(), Arc::clone(&pattern));
        Ok(pattern)
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a value counts as missing for `required`.
///
/// `strict` also treats the empty string as missing.
pub fn is_missing(value: Option<&Value>, strict: bool) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => strict && s.is_empty(),
        Some(_) => false,
    }
}

/// Evaluate one synchronous rule against `ctx.value`.
///
/// # Errors
///
/// Returns `ConfigError` when `rule` is malformed for `vector`.
pub fn check(
    vector: Vector,
    rule: &Value,
    ctx: &RuleContext<'_>,
    strict_required: bool,
    patterns: &PatternCache,
) -> Result<bool, ConfigError> {
    match vector {
        Vector::Required => Ok(!truthy(rule) || !is_missing(Some(ctx.value), strict_required)),
        Vector::Type => check_type(rule, ctx),
        Vector::Length => check_length(rule, ctx),
        Vector::Regex => check_regex(rule, ctx, patterns),
        Vector::OneOf => check_one_of(rule, ctx),
        Vector::CanParse => Ok(check_can_parse(rule, ctx)),
        Vector::Gt => guarded_bound(vector, rule, ctx, |v, b| v > b),
        Vector::Gte => guarded_bound(vector, rule, ctx, |v, b| v >= b),
        Vector::Lt => coerced_bound(vector, rule, ctx, |v, b| v < b),
        Vector::Lte => coerced_bound(vector, rule, ctx, |v, b| v <= b),
        // evaluated by the engine
        Vector::Custom | Vector::Items => Ok(true),
    }
}

fn check_type(rule: &Value, ctx: &RuleContext<'_>) -> Result<bool, ConfigError> {
    Ok(TypeName::from_rule(rule, ctx.path())?.matches(ctx.value))
}

fn check_length(rule: &Value, ctx: &RuleContext<'_>) -> Result<bool, ConfigError> {
    let len = match ctx.value {
        Value::Array(arr) => arr.len(),
        other => display_string(other).chars().count(),
    };
    let actual = len as f64;

    match rule {
        Value::Number(n) => Ok(n.as_f64() == Some(actual)),
        Value::Object(bounds) => {
            let bound = |key: &str| -> Result<Option<f64>, ConfigError> {
                match bounds.get(key) {
                    None | Some(Value::Null) => Ok(None),
                    Some(Value::Number(n)) => Ok(n.as_f64()),
                    Some(other) => Err(invalid(
                        Vector::Length,
                        ctx,
                        format!("{} must be a number, got {}", key, json_type_name(other)),
                    )),
                }
            };
            let min_ok = bound("min")?.map_or(true, |min| actual >= min);
            let max_ok = bound("max")?.map_or(true, |max| actual <= max);
            Ok(min_ok && max_ok)
        }
        other => Err(invalid(
            Vector::Length,
            ctx,
            format!("expected a number or {{min, max}}, got {}", json_type_name(other)),
        )),
    }
}

fn check_regex(
    rule: &Value,
    ctx: &RuleContext<'_>,
    patterns: &PatternCache,
) -> Result<bool, ConfigError> {
    let Some(source) = rule.as_str() else {
        return Err(invalid(
            Vector::Regex,
            ctx,
            format!("expected a pattern string, got {}", json_type_name(rule)),
        ));
    };
    let pattern = patterns
        .compile(source)
        .map_err(|source| ConfigError::InvalidPattern {
            path: ctx.path(),
            source,
        })?;
    // backtracking can hit its limit on pathological input; count it as a miss
    Ok(pattern
        .is_match(&display_string(ctx.value))
        .unwrap_or_else(|e| {
            warn!(path = %ctx.path(), error = %e, "regex evaluation failed");
            false
        }))
}

fn check_one_of(rule: &Value, ctx: &RuleContext<'_>) -> Result<bool, ConfigError> {
    match rule {
        Value::Array(options) => Ok(options.iter().any(|o| strict_eq(o, ctx.value))),
        other => Err(invalid(
            Vector::OneOf,
            ctx,
            format!("expected a list of options, got {}", json_type_name(other)),
        )),
    }
}

fn check_can_parse(rule: &Value, ctx: &RuleContext<'_>) -> bool {
    match rule.as_str().and_then(ParseKind::parse) {
        Some(kind) => kind.accepts(ctx.value),
        None => {
            warn!(path = %ctx.path(), rule = %rule, "unknown canParse kind, field rejected");
            false
        }
    }
}

/// `gt`/`gte`: values that are not numbers pass.
fn guarded_bound(
    vector: Vector,
    rule: &Value,
    ctx: &RuleContext<'_>,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<bool, ConfigError> {
    let Some(bound) = bound(vector, rule, ctx)? else {
        return Ok(true);
    };
    match ctx.value.as_f64() {
        Some(value) => Ok(cmp(value, bound)),
        None => Ok(true),
    }
}

/// `lt`/`lte`: the value is coerced to a number, NaN fails.
fn coerced_bound(
    vector: Vector,
    rule: &Value,
    ctx: &RuleContext<'_>,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<bool, ConfigError> {
    let Some(bound) = bound(vector, rule, ctx)? else {
        return Ok(true);
    };
    Ok(cmp(to_number(ctx.value), bound))
}

fn bound(vector: Vector, rule: &Value, ctx: &RuleContext<'_>) -> Result<Option<f64>, ConfigError> {
    match rule {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        other => Err(invalid(
            vector,
            ctx,
            format!("bound must be a number, got {}", json_type_name(other)),
        )),
    }
}

fn invalid(vector: Vector, ctx: &RuleContext<'_>, message: String) -> ConfigError {
    ConfigError::InvalidRule {
        path: ctx.path(),
        vector: vector.name(),
        message,
    }
}
