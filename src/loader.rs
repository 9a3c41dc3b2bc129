//! Document loading from files, strings and HTTP URLs.
//!
//! Descriptor documents are additionally checked against a built-in JSON
//! Schema before they are handed to the engine.

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::descriptor::FieldDescriptor;
use crate::error::LoadError;
use crate::messages::ErrorMessages;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load a JSON document from a string.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the server
/// answers with an error status.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load from a file path or, when `source` is a URL, over HTTP.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// Load a descriptor list and check its shape.
///
/// # Errors
///
/// Returns `LoadError::InvalidDocument` listing every schema violation.
pub fn load_descriptors(source: &str) -> Result<Vec<FieldDescriptor>, LoadError> {
    let document = load_json_auto(source)?;
    check_descriptors(&document)?;
    typed("descriptors", document)
}

/// Load a model registry: an object mapping names to descriptors.
pub fn load_models(source: &str) -> Result<HashMap<String, FieldDescriptor>, LoadError> {
    let document = load_json_auto(source)?;
    if let Value::Object(map) = &document {
        let wrong: Vec<String> = map
            .iter()
            .filter(|(_, v)| !v.is_object())
            .map(|(name, _)| format!("/{}: model must be an object", name))
            .collect();
        if !wrong.is_empty() {
            return Err(LoadError::InvalidDocument {
                kind: "models",
                errors: wrong,
            });
        }
    }
    typed("models", document)
}

/// Load an error-message schema.
pub fn load_messages(source: &str) -> Result<ErrorMessages, LoadError> {
    typed("messages", load_json_auto(source)?)
}

/// Check a descriptor document against the built-in descriptor schema.
pub fn check_descriptors(document: &Value) -> Result<(), LoadError> {
    let schema = descriptor_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| LoadError::InvalidDocument {
        kind: "descriptor schema",
        errors: vec![e.to_string()],
    })?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| {
            let at = e.instance_path.to_string();
            format!("{}: {}", if at.is_empty() { "/" } else { &at }, e)
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::InvalidDocument {
            kind: "descriptors",
            errors,
        })
    }
}

fn typed<T: DeserializeOwned>(kind: &'static str, document: Value) -> Result<T, LoadError> {
    serde_json::from_value(document).map_err(|e| LoadError::InvalidDocument {
        kind,
        errors: vec![e.to_string()],
    })
}

fn descriptor_schema() -> Value {
    let bound = json!({ "type": ["number", "null"] });
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "array",
        "items": { "$ref": "#/definitions/descriptor" },
        "definitions": {
            "descriptor": {
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "key": { "type": "string" },
                    "label": { "type": "string" },
                    "model": { "type": "string" },
                    "customError": { "type": "string" },
                    "onError": {
                        "type": "object",
                        "additionalProperties": { "type": "string" }
                    },
                    "type": { "type": "string" },
                    "regex": { "type": "string" },
                    "custom": { "type": "string" },
                    "canParse": { "type": "string" },
                    "oneOf": { "type": "array" },
                    "length": {
                        "anyOf": [
                            { "type": "number" },
                            {
                                "type": "object",
                                "properties": { "min": bound, "max": bound },
                                "additionalProperties": false
                            }
                        ]
                    },
                    "gt": bound,
                    "gte": bound,
                    "lt": bound,
                    "lte": bound,
                    "items": {
                        "anyOf": [
                            {
                                "type": "array",
                                "items": { "$ref": "#/definitions/descriptor" }
                            },
                            { "$ref": "#/definitions/descriptor" }
                        ]
                    }
                }
            }
        }
    })
}
