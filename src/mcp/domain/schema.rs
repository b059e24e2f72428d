//! Translation of JSON-Schema-like input shapes into [`Validator`] trees.
//!
//! Translation is pure: it never mutates its input and produces structurally
//! equal validators for equal inputs.

use super::{
    AdditionalFields, NumberRule, ObjectField, ObjectRule, SchemaTranslationError, StringRule,
    Validator, ValidatorRule,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Translates the root input shape of an operation.
///
/// The root must declare `type: "object"` with a non-empty `properties` map.
///
/// # Errors
///
/// Returns [`SchemaTranslationError`] when the root is not an object shape or
/// declares no properties.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use toolbridge::mcp::domain::translate_input_schema;
///
/// let validator = translate_input_schema(&json!({
///     "type": "object",
///     "properties": {"path": {"type": "string"}},
///     "required": ["path"]
/// }))
/// .expect("schema should translate");
///
/// assert!(validator.validate(&json!({"path": "notes.txt"})).is_ok());
/// assert!(validator.validate(&json!({})).is_err());
/// ```
pub fn translate_input_schema(schema: &Value) -> Result<Validator, SchemaTranslationError> {
    let Some(node) = schema.as_object() else {
        return Err(SchemaTranslationError::RootNotObject {
            found: describe_non_object(schema),
        });
    };

    match declared_type(node) {
        Some("object") => {}
        Some(other) => {
            return Err(SchemaTranslationError::RootNotObject {
                found: other.to_owned(),
            });
        }
        None => {
            return Err(SchemaTranslationError::RootNotObject {
                found: "an untyped shape".to_owned(),
            });
        }
    }

    let properties = node
        .get("properties")
        .and_then(Value::as_object)
        .ok_or(SchemaTranslationError::MissingRootProperties)?;
    if properties.is_empty() {
        return Err(SchemaTranslationError::EmptyRootProperties);
    }

    Ok(Validator::new(
        ValidatorRule::Object(object_rule(node, properties)),
        description_of(node),
    ))
}

/// Translates a nested shape; unusable shapes become accept-anything nodes.
#[must_use]
pub fn translate_shape(schema: &Value) -> Validator {
    let Some(node) = schema.as_object() else {
        return Validator::fallback();
    };
    let description = description_of(node);

    let rule = match declared_type(node) {
        Some("string") => ValidatorRule::String(string_rule(node)),
        Some("number") => ValidatorRule::Number(number_rule(node)),
        Some("boolean") => ValidatorRule::Boolean,
        Some("array") => ValidatorRule::Array(Box::new(
            node.get("items").map_or_else(Validator::fallback, translate_shape),
        )),
        Some("object") => object_shape(node).unwrap_or(ValidatorRule::Fallback),
        _ => ValidatorRule::Fallback,
    };

    Validator::new(rule, description)
}

fn object_shape(node: &Map<String, Value>) -> Option<ValidatorRule> {
    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        return Some(ValidatorRule::Object(object_rule(node, properties)));
    }

    match additional_fields(node) {
        AdditionalFields::Forbidden => None,
        additional => Some(ValidatorRule::Object(ObjectRule::new(
            BTreeMap::new(),
            additional,
        ))),
    }
}

fn object_rule(node: &Map<String, Value>, properties: &Map<String, Value>) -> ObjectRule {
    let required: BTreeSet<&str> = node
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let fields = properties
        .iter()
        .map(|(name, shape)| {
            let validator = translate_shape(shape);
            let field = if required.contains(name.as_str()) {
                ObjectField::required(validator)
            } else {
                ObjectField::optional(validator)
            };
            (name.clone(), field)
        })
        .collect();

    ObjectRule::new(fields, additional_fields(node))
}

fn additional_fields(node: &Map<String, Value>) -> AdditionalFields {
    match node.get("additionalProperties") {
        Some(Value::Bool(true)) => AdditionalFields::Permissive,
        Some(shape @ Value::Object(_)) => AdditionalFields::Typed(Box::new(translate_shape(shape))),
        _ => AdditionalFields::Forbidden,
    }
}

fn string_rule(node: &Map<String, Value>) -> StringRule {
    let allowed: Vec<String> = enumeration(node)
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect();
    if allowed.is_empty() {
        StringRule::Any
    } else {
        StringRule::OneOf(allowed)
    }
}

fn number_rule(node: &Map<String, Value>) -> NumberRule {
    let mut allowed: Vec<_> = enumeration(node)
        .iter()
        .filter_map(|value| value.as_number().cloned())
        .collect();
    match allowed.len() {
        0 => NumberRule::Any,
        1 => allowed.pop().map_or(NumberRule::Any, NumberRule::Literal),
        _ => NumberRule::OneOf(allowed),
    }
}

fn enumeration(node: &Map<String, Value>) -> &[Value] {
    node.get("enum")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn declared_type(node: &Map<String, Value>) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

fn description_of(node: &Map<String, Value>) -> String {
    node.get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn describe_non_object(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
    .to_owned()
}
