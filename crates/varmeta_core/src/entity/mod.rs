//! Domain entities built on the generic persistence engine.
//!
//! # Responsibility
//! - Supply each entity's descriptor, typed read model and domain
//!   operations.
//! - Share the nested label/category payload checks used by several entity
//!   validators.
//!
//! # Invariants
//! - The engine below this layer never sees domain semantics, only column
//!   names and scalar values.

use crate::validate::{validate_identifier, ValidationResult};
use serde_json::Value;

pub mod category;
pub mod category_set;
pub mod label;
pub mod variable;

/// Payload truthiness shared by the validators: null, zero, empty strings
/// and empty containers all count as absent.
pub(crate) fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Checks a required lowercase-identifier `name` key of one payload map.
pub(crate) fn check_name_field(
    result: &mut ValidationResult,
    map: &serde_json::Map<String, Value>,
    field: &str,
    label: &str,
) {
    let value = map.get("name");
    if !is_present(value) {
        result.add_error(field, format!("{label} is required"));
        return;
    }
    match value.and_then(Value::as_str) {
        Some(name) if validate_identifier(name) => {}
        _ => result.add_error(field, format!("{label} must be a lowercase identifier")),
    }
}

/// Validates an inline label list under `prefix` (e.g. `labels` or
/// `categories[2].labels`).
pub(crate) fn check_labels_value(result: &mut ValidationResult, prefix: &str, value: &Value) {
    let Value::Array(items) = value else {
        result.add_error(prefix, "Labels must be a list");
        return;
    };
    for (index, item) in items.iter().enumerate() {
        let Value::Object(label) = item else {
            result.add_error(format!("{prefix}[{index}]"), "Label must be an object");
            continue;
        };
        if !is_present(label.get("text")) {
            result.add_error(format!("{prefix}[{index}].text"), "Label text is required");
        }
        if !label.contains_key("language_code") && !label.contains_key("language") {
            result.add_error(
                format!("{prefix}[{index}].language"),
                "Either language_code or language is required",
            );
        }
    }
}

/// Validates an inline category list under `prefix`, including each
/// category's own labels.
pub(crate) fn check_categories_value(result: &mut ValidationResult, prefix: &str, value: &Value) {
    let Value::Array(items) = value else {
        result.add_error(prefix, "Categories must be a list");
        return;
    };
    for (index, item) in items.iter().enumerate() {
        let Value::Object(category) = item else {
            result.add_error(format!("{prefix}[{index}]"), "Category must be an object");
            continue;
        };
        check_name_field(
            result,
            category,
            &format!("{prefix}[{index}].name"),
            "Category name",
        );
        if let Some(labels) = category.get("labels") {
            if is_present(Some(labels)) {
                check_labels_value(result, &format!("{prefix}[{index}].labels"), labels);
            }
        }
    }
}
