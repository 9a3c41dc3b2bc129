//! Core types: rule names, type names, parse kinds and value coercion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use fancy_regex::Regex;
use serde_json::{Number, Value};

use crate::error::ConfigError;

/// Descriptor keys that configure a field without being rules.
pub const METADATA_KEYS: &[&str] = &["path", "key", "label", "model", "onError", "customError"];

/// Largest magnitude, in milliseconds from the epoch, a timestamp may have.
const MAX_TIMESTAMP_MS: f64 = 8.64e15;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A named rule that can be attached to a descriptor.
///
/// Any descriptor key whose name parses to a `Vector` is an active rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vector {
    Required,
    Type,
    Length,
    Regex,
    OneOf,
    CanParse,
    Gt,
    Lt,
    Gte,
    Lte,
    Custom,
    Items,
}

impl Vector {
    pub const ALL: &'static [Vector] = &[
        Vector::Required,
        Vector::Type,
        Vector::Length,
        Vector::Regex,
        Vector::OneOf,
        Vector::CanParse,
        Vector::Gt,
        Vector::Lt,
        Vector::Gte,
        Vector::Lte,
        Vector::Custom,
        Vector::Items,
    ];

    /// Parse a descriptor key. Matching is exact: `oneof` is not `oneOf`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == s)
    }

    /// The key this rule is spelled with in a descriptor.
    pub fn name(&self) -> &'static str {
        match self {
            Vector::Required => "required",
            Vector::Type => "type",
            Vector::Length => "length",
            Vector::Regex => "regex",
            Vector::OneOf => "oneOf",
            Vector::CanParse => "canParse",
            Vector::Gt => "gt",
            Vector::Lt => "lt",
            Vector::Gte => "gte",
            Vector::Lte => "lte",
            Vector::Custom => "custom",
            Vector::Items => "items",
        }
    }
}

impl std::fmt::Display for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type names accepted by the `type` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    String,
    Number,
    Array,
    Object,
    Boolean,
    Null,
    Undefined,
    RegExp,
    Date,
}

impl TypeName {
    /// Parse a type name case-insensitively (`string`, `String`, `STRING`).
    ///
    /// Returns `None` for unknown names (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" => Some(TypeName::String),
            "number" => Some(TypeName::Number),
            "array" => Some(TypeName::Array),
            "object" => Some(TypeName::Object),
            "boolean" => Some(TypeName::Boolean),
            "null" => Some(TypeName::Null),
            "undefined" => Some(TypeName::Undefined),
            "regexp" => Some(TypeName::RegExp),
            "date" => Some(TypeName::Date),
            _ => None,
        }
    }

    /// Parse the value of a `type` rule, reporting unknown names against `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownType` for unknown names or non-string values.
    pub fn from_rule(rule: &Value, path: String) -> Result<Self, ConfigError> {
        rule.as_str()
            .and_then(TypeName::parse)
            .ok_or_else(|| ConfigError::UnknownType {
                path,
                name: match rule {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            })
    }

    /// Test a present value against this type.
    ///
    /// JSON carries no native date or pattern values, so `Date` matches an
    /// RFC 3339 timestamp string and `RegExp` a `/source/flags` literal that
    /// compiles. `Undefined` never matches a present value.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TypeName::String => value.is_string(),
            TypeName::Number => value.is_number(),
            TypeName::Array => value.is_array(),
            TypeName::Object => value.is_object(),
            TypeName::Boolean => value.is_boolean(),
            TypeName::Null => value.is_null(),
            TypeName::Undefined => false,
            TypeName::RegExp => value
                .as_str()
                .and_then(regex_literal)
                .is_some_and(|(source, flags)| compile_pattern(source, flags).is_ok()),
            TypeName::Date => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
        }
    }
}

/// Target formats of the `canParse` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseKind {
    Date,
    Int,
    Float,
}

impl ParseKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "date" => Some(ParseKind::Date),
            "int" => Some(ParseKind::Int),
            "float" => Some(ParseKind::Float),
            _ => None,
        }
    }

    /// Whether `value` can be read in this format.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParseKind::Date => parses_as_date(value),
            ParseKind::Int => has_int_prefix(&display_string(value)),
            ParseKind::Float => has_float_prefix(&display_string(value)),
        }
    }
}

/// Split a `/source/flags` literal. Flags must be drawn from `dgimsuvy`.
pub fn regex_literal(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let flags = &rest[end + 1..];
    if !flags.chars().all(|c| "dgimsuvy".contains(c)) {
        return None;
    }
    Some((&rest[..end], flags))
}

/// Compile a pattern source with literal-style flags (`i`, `m`, `s`, `x`).
///
/// Lookaround and backreferences are supported. Flags without a
/// counterpart (`g`, `y`, `u`) are ignored.
pub fn compile_pattern(source: &str, flags: &str) -> Result<Regex, fancy_regex::Error> {
    let inline: String = "imsx".chars().filter(|c| flags.contains(*c)).collect();
    if inline.is_empty() {
        Regex::new(source)
    } else {
        Regex::new(&format!("(?{inline}){source}"))
    }
}

/// Render a value the way rules that work on text see it.
///
/// Strings pass through, integral floats drop the fraction, arrays join
/// their elements with commas, objects render as `[object Object]`.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => display_number(n),
        Value::String(s) => s.clone(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => display_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn display_number(n: &Number) -> String {
    if let Some(f) = n.as_f64() {
        if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 {
            // `-0.0` prints as "0"
            return format!("{:.0}", f + 0.0);
        }
    }
    n.to_string()
}

/// Loose numeric reading used by comparison rules.
///
/// Blank strings and `null` are zero, booleans are 0/1, unparsable text and
/// objects are NaN. Unsigned `0x`, `0o` and `0b` literals read in their
/// radix. Single-element arrays read as their element.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                match t {
                    "Infinity" | "+Infinity" => f64::INFINITY,
                    "-Infinity" => f64::NEG_INFINITY,
                    _ if radix_prefix(t).is_some() => parse_radix(t),
                    // `inf`, `nan` and friends are not numbers here
                    _ if strip_sign(t).starts_with(|c: char| c.is_ascii_alphabetic()) => f64::NAN,
                    _ => t.parse::<f64>().unwrap_or(f64::NAN),
                }
            }
        }
        Value::Array(arr) => match arr.as_slice() {
            [] => 0.0,
            [single] => to_number(&Value::String(display_string(single))),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

/// Equality used by `oneOf`: numbers compare by value (`1 == 1.0`),
/// everything else structurally.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Leading-integer check: optional whitespace and sign, then a decimal digit
/// or a `0x` hex digit.
fn has_int_prefix(s: &str) -> bool {
    let t = strip_sign(s.trim_start());
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return hex.starts_with(|c: char| c.is_ascii_hexdigit());
    }
    t.starts_with(|c: char| c.is_ascii_digit())
}

/// Leading-float check: optional whitespace and sign, then `Infinity`, a
/// digit, or a dot followed by a digit.
fn has_float_prefix(s: &str) -> bool {
    let t = strip_sign(s.trim_start());
    if t.starts_with("Infinity") {
        return true;
    }
    let mut chars = t.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn radix_prefix(s: &str) -> Option<(u32, &str)> {
    let digits = s.get(2..)?;
    match &s[..2] {
        "0x" | "0X" => Some((16, digits)),
        "0o" | "0O" => Some((8, digits)),
        "0b" | "0B" => Some((2, digits)),
        _ => None,
    }
}

/// Read a prefixed integer literal of any length; malformed digits are NaN.
fn parse_radix(s: &str) -> f64 {
    let Some((radix, digits)) = radix_prefix(s) else {
        return f64::NAN;
    };
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN)
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(['+', '-']).unwrap_or(s)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

fn parses_as_date(value: &Value) -> bool {
    match value {
        // null and booleans read as the timestamps 0 and 1
        Value::Null | Value::Bool(_) => true,
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|ms| ms.is_finite() && ms.abs() <= MAX_TIMESTAMP_MS),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s).is_ok()
                || DateTime::parse_from_rfc2822(s).is_ok()
                || DATETIME_FORMATS
                    .iter()
                    .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
                || DATE_FORMATS
                    .iter()
                    .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
        }
        _ => false,
    }
}
