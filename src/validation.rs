//! Input validation for product and inquiry payloads
//!
//! Each record shape has a rule table listing its caller-supplied fields in
//! declaration order. Server-assigned fields (`id`, `createdAt`) have no rule
//! and are ignored, as are unknown keys. Validation stops at the first
//! offending field so the API can report exactly one `{message, field}` pair.
//!
//! Email addresses are deliberately accepted as any non-empty string.

use crate::model::{NewInquiry, NewProduct, ProductCategory};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Must be present and a non-blank string
    RequiredText,
    /// May be absent or null; otherwise must be a string
    OptionalText,
    /// Must be one of the `ProductCategory` wire names
    Category,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldRule {
    const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::RequiredText,
        }
    }

    const fn optional(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::OptionalText,
        }
    }
}

pub const PRODUCT_RULES: &[FieldRule] = &[
    FieldRule::required("name"),
    FieldRule::required("description"),
    FieldRule::required("price"),
    FieldRule {
        name: "category",
        kind: FieldKind::Category,
    },
    FieldRule::required("imageUrl"),
];

pub const INQUIRY_RULES: &[FieldRule] = &[
    FieldRule::required("name"),
    FieldRule::required("email"),
    FieldRule::required("message"),
    FieldRule::optional("serviceOfInterest"),
];

/// First validation failure found in a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending key, or empty when the payload itself is the problem
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a payload against a rule table, stopping at the first failure
pub fn validate(payload: &Value, rules: &[FieldRule]) -> Result<(), ValidationError> {
    let object = payload.as_object().ok_or_else(|| {
        ValidationError::new("", format!("Expected object, received {}", json_type(payload)))
    })?;

    for rule in rules {
        check_field(object, rule)?;
    }

    Ok(())
}

fn check_field(object: &Map<String, Value>, rule: &FieldRule) -> Result<(), ValidationError> {
    let value = object.get(rule.name).unwrap_or(&Value::Null);

    match (rule.kind, value) {
        (FieldKind::OptionalText, Value::Null) => Ok(()),
        (FieldKind::OptionalText, Value::String(_)) => Ok(()),
        (_, Value::Null) => Err(ValidationError::new(
            rule.name,
            format!("{} is required", rule.name),
        )),
        (FieldKind::Category, Value::String(s)) => {
            s.parse::<ProductCategory>().map(|_| ()).map_err(|_| {
                let allowed: Vec<&str> = ProductCategory::ALL.iter().map(|c| c.as_str()).collect();
                ValidationError::new(
                    rule.name,
                    format!("{} must be one of: {}", rule.name, allowed.join(", ")),
                )
            })
        }
        (FieldKind::RequiredText, Value::String(s)) if s.trim().is_empty() => Err(
            ValidationError::new(rule.name, format!("{} must not be empty", rule.name)),
        ),
        (FieldKind::RequiredText, Value::String(_)) => Ok(()),
        (_, other) => Err(ValidationError::new(
            rule.name,
            format!("Expected string, received {}", json_type(other)),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_with<T: DeserializeOwned>(payload: Value, rules: &[FieldRule]) -> Result<T, ValidationError> {
    validate(&payload, rules)?;
    serde_json::from_value(payload).map_err(|e| ValidationError::new("", e.to_string()))
}

/// Validate and convert a contact-form payload
pub fn parse_new_inquiry(payload: Value) -> Result<NewInquiry, ValidationError> {
    parse_with(payload, INQUIRY_RULES)
}

/// Validate and convert a catalog entry payload
pub fn parse_new_product(payload: Value) -> Result<NewProduct, ValidationError> {
    parse_with(payload, PRODUCT_RULES)
}
