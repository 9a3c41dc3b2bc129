//! Descriptor linting: static checks that need no payload.
//!
//! Catches what `validate` would only report as a `ConfigError` once a
//! payload reached the offending rule, plus suspicious keys that are silently
//! ignored at runtime:
//! - descriptors that are not objects, unknown models and types
//! - `items` misuse, regexes that do not compile, malformed rule values
//! - unknown keys, descriptors without a path, unknown `canParse` kinds

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::descriptor::FieldDescriptor;
use crate::loader::load_json;
use crate::model::{self, ModelLookup};
use crate::types::{
    compile_pattern, json_type_name, regex_literal, ParseKind, TypeName, Vector, METADATA_KEYS,
};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// JSON pointer into the descriptor document (e.g. "/2/items/0/type").
    pub path: String,
    pub message: String,
}

/// Result of linting one descriptor document.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub descriptors: usize,
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl LintResult {
    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Like [`is_ok`](Self::is_ok), but in strict mode warnings fail too.
    pub fn passed(&self, strict: bool) -> bool {
        self.is_ok() && (!strict || self.warnings == 0)
    }

    fn from_diagnostics(descriptors: usize, diagnostics: Vec<Diagnostic>) -> Self {
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        LintResult {
            file: None,
            descriptors,
            errors,
            warnings: diagnostics.len() - errors,
            diagnostics,
        }
    }
}

/// Lint a descriptor list.
pub fn lint(descriptors: &Value, models: &dyn ModelLookup) -> LintResult {
    let mut linter = Linter {
        models,
        diagnostics: Vec::new(),
    };
    let count = match descriptors {
        Value::Array(list) => {
            linter.check_list(list, "");
            list.len()
        }
        other => {
            linter.error(
                "E001",
                "",
                format!("expected a list of descriptors, got {}", json_type_name(other)),
            );
            0
        }
    };
    LintResult::from_diagnostics(count, linter.diagnostics)
}

/// Load a descriptor document from disk and lint it.
///
/// A document that cannot be loaded yields a single `E000` error.
pub fn lint_file(file: &Path, models: &dyn ModelLookup) -> LintResult {
    let mut result = match load_json(file) {
        Ok(document) => lint(&document, models),
        Err(e) => LintResult::from_diagnostics(
            0,
            vec![Diagnostic {
                severity: Severity::Error,
                code: "E000".to_string(),
                path: String::new(),
                message: format!("cannot load descriptors: {}", e),
            }],
        ),
    };
    result.file = Some(file.to_path_buf());
    result
}

struct Linter<'m> {
    models: &'m dyn ModelLookup,
    diagnostics: Vec<Diagnostic>,
}

impl Linter<'_> {
    fn error(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Error, code, path, message);
    }

    fn warning(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Warning, code, path, message);
    }

    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            message,
        });
    }

    fn check_list(&mut self, list: &[Value], pointer: &str) {
        for (i, value) in list.iter().enumerate() {
            let child = format!("{}/{}", pointer, i);
            match value {
                Value::Object(map) => self.check_descriptor(map, &child, true),
                other => self.error(
                    "E001",
                    &child,
                    format!("descriptor must be an object, got {}", json_type_name(other)),
                ),
            }
        }
    }

    /// `addressed` is false for the element descriptor of a simple array,
    /// which applies to the element itself and has no path.
    fn check_descriptor(&mut self, map: &Map<String, Value>, pointer: &str, addressed: bool) {
        let raw = FieldDescriptor::from(map.clone());
        let resolved = model::resolve(&raw, self.models).map(|d| d.into_owned());
        let descriptor = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                self.error("E002", &format!("{}/model", pointer), e.to_string());
                raw
            }
        };

        for key in descriptor.as_map().keys() {
            if Vector::parse(key).is_none() && !METADATA_KEYS.contains(&key.as_str()) {
                self.warning(
                    "W001",
                    &format!("{}/{}", pointer, key),
                    format!("unknown key \"{}\" is ignored", key),
                );
            }
        }

        if addressed && descriptor.path().is_none() {
            self.warning(
                "W002",
                pointer,
                "descriptor has neither path nor key; it never sees a value".to_string(),
            );
        }

        let declared = match descriptor.type_name() {
            Ok(name) => name,
            Err(e) => {
                self.error("E003", &format!("{}/type", pointer), e.to_string());
                None
            }
        };

        for (vector, rule) in descriptor.vectors() {
            let at = format!("{}/{}", pointer, vector);
            match vector {
                Vector::Regex => self.check_regex(rule, &at),
                Vector::Length => self.check_length(rule, &at),
                Vector::Gt | Vector::Gte | Vector::Lt | Vector::Lte => {
                    if !matches!(rule, Value::Null | Value::Number(_)) {
                        self.error(
                            "E007",
                            &at,
                            format!("bound must be a number, got {}", json_type_name(rule)),
                        );
                    }
                }
                Vector::OneOf => {
                    if !rule.is_array() {
                        self.error(
                            "E007",
                            &at,
                            format!("expected a list of options, got {}", json_type_name(rule)),
                        );
                    }
                }
                Vector::CanParse => {
                    if rule.as_str().and_then(ParseKind::parse).is_none() {
                        self.warning(
                            "W003",
                            &at,
                            format!("unknown canParse kind {}; every value will fail", rule),
                        );
                    }
                }
                Vector::Custom => {
                    if !rule.is_string() {
                        self.error(
                            "E007",
                            &at,
                            format!("expected a validator name, got {}", json_type_name(rule)),
                        );
                    }
                }
                Vector::Items => self.check_items(rule, &at, declared),
                Vector::Required | Vector::Type => {}
            }
        }
    }

    fn check_items(&mut self, rule: &Value, pointer: &str, declared: Option<TypeName>) {
        if declared != Some(TypeName::Array) {
            self.error("E004", pointer, "items requires type Array".to_string());
        }
        match rule {
            Value::Array(list) => self.check_list(list, pointer),
            Value::Object(map) => {
                if map.contains_key("items") || map.contains_key("path") {
                    self.error(
                        "E005",
                        pointer,
                        "simple items cannot carry path or items; use a list of descriptors".to_string(),
                    );
                }
                self.check_descriptor(map, pointer, false);
            }
            other => self.error(
                "E007",
                pointer,
                format!("expected a list of descriptors or a descriptor, got {}", json_type_name(other)),
            ),
        }
    }

    fn check_regex(&mut self, rule: &Value, pointer: &str) {
        let Some(source) = rule.as_str() else {
            self.error(
                "E007",
                pointer,
                format!("expected a pattern string, got {}", json_type_name(rule)),
            );
            return;
        };
        let (pattern, flags) = regex_literal(source).unwrap_or((source, ""));
        if let Err(e) = compile_pattern(pattern, flags) {
            self.error("E006", pointer, format!("regex does not compile: {}", e));
        }
    }

    fn check_length(&mut self, rule: &Value, pointer: &str) {
        match rule {
            Value::Number(_) => {}
            Value::Object(bounds) => {
                for (key, value) in bounds {
                    let known = key == "min" || key == "max";
                    if !known || !matches!(value, Value::Null | Value::Number(_)) {
                        self.error(
                            "E007",
                            &format!("{}/{}", pointer, key),
                            format!("expected numeric min or max, got {} = {}", key, value),
                        );
                    }
                }
            }
            other => self.error(
                "E007",
                pointer,
                format!("expected a number or {{min, max}}, got {}", json_type_name(other)),
            ),
        }
    }
}
