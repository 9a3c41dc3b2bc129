//! Library integration tests: validation, model resolution and trimming.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pineapple::{
    from_fn, BoxError, ConfigError, CustomValidator, ErrorMessages, FieldDescriptor, Validator,
    Vector, Verdict,
};
use serde_json::{json, Value};

fn descriptors(value: Value) -> Vec<FieldDescriptor> {
    FieldDescriptor::list_from_value(value).unwrap()
}

fn logs(errors: &[pineapple::FieldError]) -> Vec<&str> {
    errors.iter().map(|e| e.log.as_str()).collect()
}

fn user_name() -> Vec<FieldDescriptor> {
    descriptors(json!([{
        "path": "user.name",
        "label": "Name",
        "required": true,
        "type": "String",
        "length": { "min": 3, "max": 100 },
        "regex": "/^[a-zA-Z0-9\\s]{3,100}$/"
    }]))
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn valid_name_passes() {
        let result = Validator::default()
            .validate(&json!({ "user": { "name": "ab12 cd34" } }), &user_name())
            .await
            .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn empty_name_is_required_error() {
        let result = Validator::default()
            .validate(&json!({ "user": { "name": "" } }), &user_name())
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_required"]);
        assert_eq!(result.errors[0].message, "Name is required");
        assert_eq!(result.errors[0].path.as_deref(), Some("user.name"));
    }

    #[tokio::test]
    async fn simple_items_report_failing_index() {
        let schema = descriptors(json!([{
            "path": "codes",
            "label": "Codes",
            "type": "Array",
            "items": { "type": "String", "length": 5 }
        }]));
        let result = Validator::default()
            .validate(&json!({ "codes": ["aaaaa", "bb"] }), &schema)
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_length @index(1)"]);
        assert_eq!(result.errors[0].message, "one of the Codes items is invalid");
        assert!(result.errors[0].errors.is_empty());
    }

    #[tokio::test]
    async fn object_items_wrap_child_errors() {
        let schema = descriptors(json!([{
            "path": "coords",
            "label": "Coordinates",
            "type": "Array",
            "items": [
                { "path": "lat", "type": "Number", "gte": -90, "lte": 90 },
                { "path": "lng", "type": "Number", "gte": -180, "lte": 180 }
            ]
        }]));
        let payload = json!({ "coords": [ { "lat": "north", "lng": 10 }, { "lat": 1, "lng": 2 } ] });
        let result = Validator::default().validate(&payload, &schema).await.unwrap();

        assert_eq!(result.errors.len(), 1);
        let parent = &result.errors[0];
        assert_eq!(parent.log, "_items @index(0)");
        assert_eq!(parent.message, "one of the Coordinates items is invalid");
        assert_eq!(logs(&parent.errors), ["_type"]);
        assert_eq!(parent.errors[0].path.as_deref(), Some("lat"));
    }

    #[tokio::test]
    async fn custom_replacement_flows_into_trim() {
        let validator = Validator::builder()
            .custom(
                "normalize",
                from_fn(|_value: Value| async move { Ok::<_, BoxError>(Verdict::from(json!("Normalized"))) }),
            )
            .build();
        let schema = descriptors(json!([
            { "path": "user.title", "custom": "normalize" },
            { "path": "user.id" }
        ]));
        let payload = json!({ "user": { "title": "  mr ", "id": 7, "secret": "x" } });

        let result = validator.validate(&payload, &schema).await.unwrap();
        assert!(result.is_valid());
        let trimmed = validator.trim(&payload, &schema, &result.formatted).unwrap();
        assert_eq!(trimmed, json!({ "user": { "title": "Normalized", "id": 7 } }));
    }
}

mod properties {
    use super::*;

    #[tokio::test]
    async fn at_most_one_error_per_descriptor() {
        let schema = descriptors(json!([
            { "path": "a", "type": "Number", "gt": 10, "oneOf": [1, 2] },
            { "path": "b", "type": "String", "length": 1, "regex": "^x$" },
            { "path": "c", "required": true, "length": 3 }
        ]));
        let payload = json!({ "a": "nope", "b": "yyy" });
        let result = Validator::default().validate(&payload, &schema).await.unwrap();
        assert!(result.errors.len() <= schema.len());
        assert_eq!(logs(&result.errors), ["_type", "_length", "_required"]);
    }

    #[tokio::test]
    async fn validation_is_idempotent() {
        let validator = Validator::default();
        let schema = user_name();
        let payload = json!({ "user": { "name": "x!" } });
        let first = validator.validate(&payload, &schema).await.unwrap();
        let second = validator.validate(&payload, &schema).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn required_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let validator = Validator::builder()
            .custom(
                "count",
                from_fn(move |_value: Value| {
                    let seen = seen.clone();
                    async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, BoxError>(Verdict::Valid)
                    }
                }),
            )
            .build();
        let schema = descriptors(json!([
            { "path": "a", "required": true, "length": 3, "custom": "count" }
        ]));
        let result = validator.validate(&json!({}), &schema).await.unwrap();
        assert_eq!(logs(&result.errors), ["_required"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn absent_optional_field_is_skipped() {
        let schema = descriptors(json!([
            { "path": "a.b", "type": "Number", "length": 99, "custom": "never-registered" },
            { "path": "c", "required": false, "oneOf": [] }
        ]));
        let result = Validator::default().validate(&json!({}), &schema).await.unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn inline_fields_win_over_model() {
        let mut models = HashMap::new();
        models.insert(
            "m".to_string(),
            FieldDescriptor::from_value(json!({ "model": "m", "label": "Base", "required": true }))
                .unwrap(),
        );
        let validator = Validator::builder().models(models).build();
        let schema = descriptors(json!([{ "path": "f", "model": "m", "label": "X" }]));

        let result = validator.validate(&json!({}), &schema).await.unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].label, "X");
        assert_eq!(result.errors[0].message, "X is required");
    }

    #[tokio::test]
    async fn model_nested_rules_merge() {
        let mut models = HashMap::new();
        models.insert(
            "age".to_string(),
            FieldDescriptor::from_value(json!({
                "type": "Number",
                "gte": 0,
                "onError": { "gte": "$label cannot be negative", "type": "$label must be a number" }
            }))
            .unwrap(),
        );
        let validator = Validator::builder().models(models).build();
        let schema = descriptors(json!([{
            "path": "age",
            "label": "Age",
            "model": "age",
            "onError": { "type": "$label: numbers only" }
        }]));

        let result = validator.validate(&json!({ "age": -1 }), &schema).await.unwrap();
        assert_eq!(result.errors[0].message, "Age cannot be negative");
        let result = validator.validate(&json!({ "age": "1" }), &schema).await.unwrap();
        assert_eq!(result.errors[0].message, "Age: numbers only");
    }

    #[tokio::test]
    async fn unknown_model_is_fatal() {
        let schema = descriptors(json!([{ "path": "f", "model": "ghost" }]));
        let err = Validator::default()
            .validate(&json!({ "f": 1 }), &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel { ref name } if name == "ghost"));
        assert_eq!(err.to_string(), "unable to find model \"ghost\"");
    }

    #[tokio::test]
    async fn unknown_type_is_fatal() {
        let schema = descriptors(json!([{ "path": "f", "type": "Integer" }]));
        let err = Validator::default()
            .validate(&json!({ "f": 1 }), &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { .. }));
    }

    #[tokio::test]
    async fn vectors_run_in_declaration_order() {
        let validator = Validator::default();
        let length_first = descriptors(json!([{ "path": "v", "length": 1, "type": "Number" }]));
        let type_first = descriptors(json!([{ "path": "v", "type": "Number", "length": 1 }]));
        let payload = json!({ "v": "abc" });

        let result = validator.validate(&payload, &length_first).await.unwrap();
        assert_eq!(logs(&result.errors), ["_length"]);
        let result = validator.validate(&payload, &type_first).await.unwrap();
        assert_eq!(logs(&result.errors), ["_type"]);
    }

    #[tokio::test]
    async fn lower_bounds_skip_non_numbers_upper_bounds_coerce() {
        let validator = Validator::default();
        let schema = descriptors(json!([
            { "path": "a", "gt": 5 },
            { "path": "b", "lt": 5 },
            { "path": "c", "lte": 5 }
        ]));
        let result = validator
            .validate(&json!({ "a": "abc", "b": "abc", "c": "4" }), &schema)
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_lt"]);
    }

    #[tokio::test]
    async fn radix_strings_compare_by_value() {
        let schema = descriptors(json!([{ "path": "n", "lt": 32 }]));
        let validator = Validator::default();
        let result = validator.validate(&json!({ "n": "0x1f" }), &schema).await.unwrap();
        assert!(result.is_valid());
        let result = validator.validate(&json!({ "n": "0b100001" }), &schema).await.unwrap();
        assert_eq!(logs(&result.errors), ["_lt"]);
    }

    #[tokio::test]
    async fn large_floats_are_measured_in_full() {
        let schema = descriptors(json!([{ "path": "n", "length": 20, "regex": "^2" }]));
        let result = Validator::default()
            .validate(&json!({ "n": 2e19 }), &schema)
            .await
            .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn booleans_parse_as_dates() {
        let schema = descriptors(json!([{ "path": "flag", "canParse": "date" }]));
        let result = Validator::default()
            .validate(&json!({ "flag": true }), &schema)
            .await
            .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn lookahead_patterns_apply_to_every_item() {
        let schema = descriptors(json!([{
            "path": "passwords",
            "type": "Array",
            "items": { "regex": "^(?=.*[0-9]).{8,}$" }
        }]));
        let validator = Validator::default();
        let result = validator
            .validate(&json!({ "passwords": ["abc12345", "9zzzzzzz"] }), &schema)
            .await
            .unwrap();
        assert!(result.is_valid());
        let result = validator
            .validate(&json!({ "passwords": ["abc12345", "abcdefgh"] }), &schema)
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_regex @index(1)"]);
    }
}

mod nesting {
    use super::*;

    fn grid() -> Vec<FieldDescriptor> {
        descriptors(json!([{
            "path": "rows",
            "label": "Rows",
            "type": "Array",
            "items": [{
                "path": "cells",
                "label": "Cells",
                "type": "Array",
                "items": [{ "path": "v", "type": "Number" }]
            }]
        }]))
    }

    #[tokio::test]
    async fn nested_object_arrays_carry_an_index_per_level() {
        let payload = json!({
            "rows": [
                { "cells": [ { "v": 1 } ] },
                { "cells": [ { "v": 1 }, { "v": 2 }, { "v": "three" } ] }
            ]
        });
        let result = Validator::default().validate(&payload, &grid()).await.unwrap();

        let outer = &result.errors[0];
        assert_eq!(outer.log, "_items @index(1)");
        let inner = &outer.errors[0];
        assert_eq!(inner.log, "_items @index(2)");
        assert_eq!(inner.label, "Cells");
        assert_eq!(logs(&inner.errors), ["_type"]);
    }

    #[tokio::test]
    async fn non_object_element_is_type_error() {
        let result = Validator::default()
            .validate(&json!({ "rows": [ { "cells": [] }, 5 ] }), &grid())
            .await
            .unwrap();
        let outer = &result.errors[0];
        assert_eq!(outer.log, "_items @index(1)");
        assert_eq!(logs(&outer.errors), ["_type"]);
        assert_eq!(outer.errors[0].message, "Rows invalid type");
    }

    #[tokio::test]
    async fn first_failing_element_halts_scan() {
        let schema = descriptors(json!([{
            "path": "tags",
            "type": "Array",
            "items": { "type": "String", "oneOf": ["a", "b"] }
        }]));
        let result = Validator::default()
            .validate(&json!({ "tags": ["a", 3, "z"] }), &schema)
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_type @index(1)"]);
    }

    #[tokio::test]
    async fn simple_items_use_parent_message_overrides() {
        let schema = descriptors(json!([{
            "path": "tags",
            "label": "Tags",
            "type": "Array",
            "onError": { "items": "$label must be short words" },
            "items": { "type": "String", "length": { "max": 3 } }
        }]));
        let result = Validator::default()
            .validate(&json!({ "tags": ["ok", "toolong"] }), &schema)
            .await
            .unwrap();
        assert_eq!(result.errors[0].message, "Tags must be short words");
        assert_eq!(result.errors[0].log, "_length @index(1)");
    }

    #[tokio::test]
    async fn nested_custom_replacements_trim_per_element() {
        let validator = Validator::builder()
            .custom(
                "round",
                from_fn(|value: Value| async move {
                    Ok::<_, BoxError>(match value.as_f64() {
                        Some(n) => Verdict::Replace(json!(n.round())),
                        None => Verdict::Invalid,
                    })
                }),
            )
            .build();
        let schema = descriptors(json!([{
            "path": "points",
            "type": "Array",
            "items": [
                { "path": "x", "custom": "round" },
                { "path": "tag" }
            ]
        }]));
        let payload = json!({ "points": [ { "x": 1.4, "junk": 1 }, { "x": 2.6, "tag": "b" } ] });

        let result = validator.validate(&payload, &schema).await.unwrap();
        assert!(result.is_valid());
        assert_eq!(result.formatted.get("points[1].x"), Some(&json!(3.0)));

        let trimmed = validator.trim(&payload, &schema, &result.formatted).unwrap();
        assert_eq!(
            trimmed,
            json!({ "points": [ { "x": 1.0 }, { "x": 3.0, "tag": "b" } ] })
        );
    }
}

mod custom_validators {
    use super::*;
    use async_trait::async_trait;

    struct Reserved(Vec<&'static str>);

    #[async_trait]
    impl CustomValidator for Reserved {
        async fn check(
            &self,
            value: &Value,
            _descriptors: &[FieldDescriptor],
        ) -> Result<Verdict, BoxError> {
            tokio::task::yield_now().await;
            let name = value.as_str().ok_or("expected a string")?;
            Ok(Verdict::from(!self.0.iter().any(|reserved| *reserved == name)))
        }
    }

    fn validator() -> Validator {
        Validator::builder()
            .custom("free", Reserved(vec!["admin", "root"]))
            .build()
    }

    #[tokio::test]
    async fn rejection_uses_custom_error() {
        let schema = descriptors(json!([{
            "path": "login",
            "label": "Login",
            "custom": "free",
            "customError": "$label is already taken"
        }]));
        let result = validator()
            .validate(&json!({ "login": "root" }), &schema)
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_custom"]);
        assert_eq!(result.errors[0].message, "Login is already taken");
    }

    #[tokio::test]
    async fn raising_validator_is_a_validation_failure() {
        let schema = descriptors(json!([{ "path": "login", "custom": "free" }]));
        let result = validator()
            .validate(&json!({ "login": 42 }), &schema)
            .await
            .unwrap();
        assert_eq!(logs(&result.errors), ["_custom"]);
        assert_eq!(result.errors[0].message, "rejected by custom validator");
    }

    #[tokio::test]
    async fn unregistered_validator_is_fatal() {
        let schema = descriptors(json!([{ "path": "login", "custom": "missing" }]));
        let err = validator()
            .validate(&json!({ "login": "x" }), &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCustomValidator { .. }));
    }

    #[tokio::test]
    async fn shared_validator_serves_concurrent_calls() {
        let validator = Arc::new(validator());
        let schema = Arc::new(descriptors(json!([{ "path": "login", "custom": "free" }])));

        let handles: Vec<_> = ["ana", "root", "bo", "admin"]
            .into_iter()
            .map(|login| {
                let validator = Arc::clone(&validator);
                let schema = Arc::clone(&schema);
                tokio::spawn(async move {
                    validator
                        .validate(&json!({ "login": login }), &schema)
                        .await
                        .map(|r| r.is_valid())
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(outcomes, [true, false, true, false]);
    }
}

mod messages {
    use super::*;

    #[tokio::test]
    async fn schema_level_templates_and_markers() {
        let messages = ErrorMessages {
            marker: "%f".to_string(),
            value_marker: "%v".to_string(),
            ..ErrorMessages::default()
        }
        .with_template(Vector::Lte, "%f: at most %v")
        .with_template(Vector::OneOf, "%f must be one of: %v");

        let validator = Validator::builder().messages(messages).build();
        let schema = descriptors(json!([
            { "path": "qty", "label": "Quantity", "lte": 10 },
            { "path": "lang", "oneOf": ["en", "ar"] }
        ]));
        let result = validator
            .validate(&json!({ "qty": 11, "lang": "fr" }), &schema)
            .await
            .unwrap();
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["Quantity: at most 10", "lang must be one of: en, ar"]);
    }

    #[tokio::test]
    async fn errors_serialize_as_objects() {
        let result = Validator::default()
            .validate(&json!({}), &descriptors(json!([{ "path": "a", "required": true }])))
            .await
            .unwrap();
        let value = serde_json::to_value(&result.errors).unwrap();
        assert_eq!(
            value,
            json!([{
                "label": "a",
                "path": "a",
                "message": "a is required",
                "log": "_required",
                "errors": []
            }])
        );
    }
}

mod trimming {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_null_is_kept() {
        let schema = descriptors(json!([
            { "path": "a.b" },
            { "path": "a.c" },
            { "path": "d" }
        ]));
        let trimmed = Validator::default()
            .trim(&json!({ "a": { "b": null }, "e": 1 }), &schema, &Default::default())
            .unwrap();
        assert_eq!(trimmed, json!({ "a": { "b": null } }));
    }

    #[test]
    fn simple_arrays_copied_whole() {
        let schema = descriptors(json!([{
            "path": "tags",
            "type": "Array",
            "items": { "type": "String" }
        }]));
        let trimmed = Validator::default()
            .trim(&json!({ "tags": ["a", "b"], "x": 1 }), &schema, &Default::default())
            .unwrap();
        assert_eq!(trimmed, json!({ "tags": ["a", "b"] }));
    }

    #[test]
    fn bracketed_paths_rebuild_arrays() {
        let schema = descriptors(json!([{ "path": "list[1].name" }]));
        let trimmed = Validator::default()
            .trim(
                &json!({ "list": [ { "name": "a" }, { "name": "b", "x": 1 } ] }),
                &schema,
                &Default::default(),
            )
            .unwrap();
        assert_eq!(trimmed, json!({ "list": [ null, { "name": "b" } ] }));
    }

    #[test]
    fn key_alias_addresses_field() {
        let schema = descriptors(json!([{ "key": "id" }]));
        let trimmed = Validator::default()
            .trim(&json!({ "id": 3, "y": 4 }), &schema, &Default::default())
            .unwrap();
        assert_eq!(trimmed, json!({ "id": 3 }));
    }
}
