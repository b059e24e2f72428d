//! Runtime validator tree built from a remote input-shape description.
//!
//! A [`Validator`] checks caller-supplied arguments structurally and returns
//! an owned copy of the accepted value. All issues are collected before an
//! error is returned.

use super::{ArgumentValidationError, ValidationIssue};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Restriction applied to string values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringRule {
    /// Any string.
    Any,
    /// One of an enumerated literal set.
    OneOf(Vec<String>),
}

/// Restriction applied to number values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumberRule {
    /// Any number.
    Any,
    /// Exactly one literal.
    Literal(Number),
    /// One of an enumerated literal set.
    OneOf(Vec<Number>),
}

/// Policy for object keys not declared in the field map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalFields {
    /// Undeclared keys are rejected.
    Forbidden,
    /// Undeclared keys are accepted untouched.
    Permissive,
    /// Undeclared keys are checked against a validator.
    Typed(Box<Validator>),
}

/// One declared object field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectField {
    validator: Validator,
    optional: bool,
}

impl ObjectField {
    /// Creates a field that must be present.
    #[must_use]
    pub const fn required(validator: Validator) -> Self {
        Self {
            validator,
            optional: false,
        }
    }

    /// Creates a field that may be absent.
    #[must_use]
    pub const fn optional(validator: Validator) -> Self {
        Self {
            validator,
            optional: true,
        }
    }

    /// Returns the field validator.
    #[must_use]
    pub const fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Returns whether the field may be absent.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Field map and extra-key policy of an object validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRule {
    fields: BTreeMap<String, ObjectField>,
    additional: AdditionalFields,
}

impl ObjectRule {
    /// Creates an object rule.
    #[must_use]
    pub const fn new(fields: BTreeMap<String, ObjectField>, additional: AdditionalFields) -> Self {
        Self { fields, additional }
    }

    /// Returns declared fields keyed by name.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, ObjectField> {
        &self.fields
    }

    /// Returns the policy for undeclared keys.
    #[must_use]
    pub const fn additional(&self) -> &AdditionalFields {
        &self.additional
    }
}

/// Kind-specific part of a validator node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorRule {
    /// String values.
    String(StringRule),
    /// Number values.
    Number(NumberRule),
    /// Boolean values.
    Boolean,
    /// Arrays whose elements all match the element validator.
    Array(Box<Validator>),
    /// Objects.
    Object(ObjectRule),
    /// Accepts any value.
    Fallback,
}

/// A node of the validator tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    rule: ValidatorRule,
    description: String,
}

impl Validator {
    /// Creates a node from a rule and its description.
    #[must_use]
    pub fn new(rule: ValidatorRule, description: impl Into<String>) -> Self {
        Self {
            rule,
            description: description.into(),
        }
    }

    /// Creates an accept-anything node with no description.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            rule: ValidatorRule::Fallback,
            description: String::new(),
        }
    }

    /// Returns the kind-specific rule.
    #[must_use]
    pub const fn rule(&self) -> &ValidatorRule {
        &self.rule
    }

    /// Returns the description carried over from the source shape.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns a short name for the accepted kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.rule {
            ValidatorRule::String(_) => "string",
            ValidatorRule::Number(_) => "number",
            ValidatorRule::Boolean => "boolean",
            ValidatorRule::Array(_) => "array",
            ValidatorRule::Object(_) => "object",
            ValidatorRule::Fallback => "any",
        }
    }

    /// Validates `value` and returns an owned copy of the accepted value.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentValidationError`] listing every issue found.
    pub fn validate(&self, value: &Value) -> Result<Value, ArgumentValidationError> {
        let mut issues = Vec::new();
        let accepted = self.check(value, "$", &mut issues);
        if issues.is_empty() {
            Ok(accepted)
        } else {
            Err(ArgumentValidationError::new(issues))
        }
    }

    /// Validates a root argument bag, which must be a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentValidationError`] when validation fails or the
    /// accepted value is not an object.
    pub fn validate_arguments(
        &self,
        value: &Value,
    ) -> Result<Map<String, Value>, ArgumentValidationError> {
        match self.validate(value)? {
            Value::Object(arguments) => Ok(arguments),
            other => Err(ArgumentValidationError::new(vec![issue(
                "$",
                format!("expected an object argument bag, found {}", json_kind(&other)),
            )])),
        }
    }

    fn check(&self, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) -> Value {
        match (&self.rule, value) {
            (ValidatorRule::Fallback, _) | (ValidatorRule::Boolean, Value::Bool(_)) => {
                value.clone()
            }
            (ValidatorRule::String(rule), Value::String(text)) => {
                if let StringRule::OneOf(allowed) = rule
                    && !allowed.contains(text)
                {
                    issues.push(issue(
                        path,
                        format!("expected one of {allowed:?}, found {text:?}"),
                    ));
                }
                value.clone()
            }
            (ValidatorRule::Number(rule), Value::Number(number)) => {
                check_number(rule, number, path, issues);
                value.clone()
            }
            (ValidatorRule::Array(element), Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| element.check(item, &format!("{path}[{index}]"), issues))
                    .collect(),
            ),
            (ValidatorRule::Object(rule), Value::Object(entries)) => {
                Value::Object(check_object(rule, entries, path, issues))
            }
            _ => {
                issues.push(issue(
                    path,
                    format!("expected {}, found {}", self.kind_name(), json_kind(value)),
                ));
                value.clone()
            }
        }
    }
}

fn check_number(rule: &NumberRule, number: &Number, path: &str, issues: &mut Vec<ValidationIssue>) {
    match rule {
        NumberRule::Any => {}
        NumberRule::Literal(expected) => {
            if !numbers_equal(expected, number) {
                issues.push(issue(path, format!("expected {expected}, found {number}")));
            }
        }
        NumberRule::OneOf(allowed) => {
            if !allowed.iter().any(|candidate| numbers_equal(candidate, number)) {
                let listed = allowed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                issues.push(issue(path, format!("expected one of [{listed}], found {number}")));
            }
        }
    }
}

fn check_object(
    rule: &ObjectRule,
    entries: &Map<String, Value>,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Map<String, Value> {
    let mut accepted = Map::new();

    for (name, field) in &rule.fields {
        let field_path = format!("{path}.{name}");
        match entries.get(name) {
            Some(entry) => {
                let checked = field.validator.check(entry, &field_path, issues);
                accepted.insert(name.clone(), checked);
            }
            None if field.optional => {}
            None => issues.push(issue(&field_path, "required field is missing")),
        }
    }

    for (name, entry) in entries {
        if rule.fields.contains_key(name) {
            continue;
        }
        let field_path = format!("{path}.{name}");
        match &rule.additional {
            AdditionalFields::Forbidden => {
                issues.push(issue(&field_path, "unexpected field"));
            }
            AdditionalFields::Permissive => {
                accepted.insert(name.clone(), entry.clone());
            }
            AdditionalFields::Typed(validator) => {
                let checked = validator.check(entry, &field_path, issues);
                accepted.insert(name.clone(), checked);
            }
        }
    }

    accepted
}

fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(left_int), Some(right_int)) = (left.as_i64(), right.as_i64()) {
        return left_int == right_int;
    }
    if let (Some(left_uint), Some(right_uint)) = (left.as_u64(), right.as_u64()) {
        return left_uint == right_uint;
    }
    left.as_f64()
        .zip(right.as_f64())
        .is_some_and(|(left_float, right_float)| left_float.total_cmp(&right_float).is_eq())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn issue(path: &str, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        path: path.to_owned(),
        message: message.into(),
    }
}
