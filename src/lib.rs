//! Pineapple
//!
//! Declarative validation and sanitization of JSON payloads.
//!
//! A payload is checked against a list of field descriptors. Each descriptor
//! addresses one location by dotted path and lists rules ("vectors") that
//! run in the order they were written. Validation reports at most one error
//! per descriptor; trimming then rebuilds the payload with only the described
//! fields, applying any values produced by custom validators.
//!
//! # Example
//!
//! ```
//! use pineapple::{FieldDescriptor, Validator};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let descriptors = FieldDescriptor::list_from_value(json!([
//!     { "path": "user.name", "label": "Name", "required": true, "type": "String" },
//!     { "path": "user.age", "type": "Number", "gte": 18 }
//! ]))
//! .unwrap();
//!
//! let validator = Validator::default();
//! let payload = json!({ "user": { "age": 15, "admin": true } });
//!
//! let result = validator.validate(&payload, &descriptors).await.unwrap();
//! let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
//! assert_eq!(messages, ["Name is required", "user.age must be greater than or equal to 18"]);
//!
//! let payload = json!({ "user": { "name": "Ana", "age": 30, "admin": true } });
//! let clean = validator.sanitize(&payload, &descriptors).await.unwrap().unwrap();
//! assert_eq!(clean, json!({ "user": { "name": "Ana", "age": 30 } }));
//! # });
//! ```
//!
//! # Vectors
//!
//! | Vector | Rule value | Fails when |
//! |--------|------------|------------|
//! | `required` | `true` | value is absent, null or (strict mode) `""` |
//! | `type` | type name | value is not of that type |
//! | `length` | `n` or `{min, max}` | element or character count out of range |
//! | `regex` | pattern or `/src/flags` | text does not match |
//! | `oneOf` | list | value strictly equals none of the options |
//! | `canParse` | `date`, `int`, `float` | value cannot be read as that kind |
//! | `gt` `gte` `lt` `lte` | number | numeric comparison fails |
//! | `custom` | registered name | the validator rejects or raises |
//! | `items` | descriptor or list | an array element fails |

mod custom;
mod descriptor;
mod engine;
mod error;
mod linter;
mod loader;
mod messages;
mod model;
mod path;
mod types;
mod vectors;

pub use custom::{from_fn, BoxError, CustomValidator, FnValidator, Verdict};
pub use descriptor::{FieldDescriptor, Items};
pub use engine::{FormattedValues, Validation, Validator, ValidatorBuilder};
pub use error::{ConfigError, FieldError, LoadError};
pub use linter::{lint, lint_file, Diagnostic, LintResult, Severity};
pub use loader::{
    check_descriptors, is_url, load_descriptors, load_json, load_json_auto, load_json_str,
    load_messages, load_models,
};
pub use messages::ErrorMessages;
pub use model::{deep_merge, resolve as resolve_model, ModelLookup, NoModels};
pub use path::{get as get_path, parse as parse_path, set as set_path, Segment};
pub use types::{ParseKind, TypeName, Vector};
pub use vectors::is_missing;

#[cfg(feature = "remote")]
pub use loader::load_json_url;
