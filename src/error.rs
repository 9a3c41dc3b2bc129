//! Error types for descriptor evaluation and document loading.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration faults in descriptors or engine setup.
///
/// These abort a `validate` or `trim` call; they are never part of the
/// returned error list.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("descriptor must be an object, got {actual}")]
    InvalidDescriptor { actual: String },

    #[error(
        "unknown type \"{name}\" at {path}: expected String, Number, Array, Object, Boolean, Null, Undefined, RegExp or Date"
    )]
    UnknownType { path: String, name: String },

    #[error("cannot validate items under {path}: field type is not Array")]
    ItemsRequiresArray { path: String },

    #[error(
        "items under {path} describe simple elements: path and items are not applicable, use a list of descriptors for arrays of objects"
    )]
    NestedItemsInSimpleArray { path: String },

    #[error("custom validator \"{name}\" not found")]
    UnknownCustomValidator { name: String },

    #[error("unable to find model \"{name}\"")]
    UnknownModel { name: String },

    #[error("invalid {vector} rule at {path}: {message}")]
    InvalidRule {
        path: String,
        vector: &'static str,
        message: String,
    },

    #[error("invalid regex at {path}: {source}")]
    InvalidPattern {
        path: String,
        #[source]
        source: fancy_regex::Error,
    },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading JSON documents (payloads, descriptors, models).
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {kind} document: {}", errors.join("; "))]
    InvalidDocument {
        kind: &'static str,
        errors: Vec<String>,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// A single field failure, as returned by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    /// Display name: the descriptor's label, else its path.
    pub label: String,
    /// Descriptor path, relative to the object the descriptor was applied to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Templated human-readable message.
    pub message: String,
    /// Stable tag: `_<vector>` plus one ` @index(<n>)` per array level.
    pub log: String,
    /// Child failures when an element of an array of objects failed.
    pub errors: Vec<FieldError>,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message)?,
            None => f.write_str(&self.message)?,
        }
        for child in &self.errors {
            write!(f, " [{}]", child)?;
        }
        Ok(())
    }
}
