//! Argument validation against a tool's declared `inputSchema`.
//!
//! Deliberately shallow: required fields, enum membership and top-level
//! primitive types. Nested arrays and objects are passed through; the backend
//! does the authoritative validation.

use serde_json::{Map, Value};

use crate::core::tool::ToolDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("field '{field}' must be one of [{allowed}], got {actual}")]
    NotInEnum {
        field: String,
        allowed: String,
        actual: String,
    },
    #[error("field '{field}' must be of type {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: String,
        actual: &'static str,
    },
    #[error("field '{0}' must not contain '.' or '..' as a path segment")]
    DotSegment(String),
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::NotInEnum { field, .. } => field,
            ValidationError::WrongType { field, .. } => field,
            ValidationError::DotSegment(field) => field,
        }
    }
}

/// Checks `args` against `descriptor.input_schema`, reporting the first
/// offending field. Required fields are checked in declaration order before
/// any property constraints.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    args: &Map<String, Value>,
) -> Result<(), ValidationError> {
    for field in descriptor.required_fields() {
        match args.get(field) {
            None | Some(Value::Null) => return Err(ValidationError::MissingField(field.to_string())),
            Some(_) => {}
        }
    }

    for (name, schema) in descriptor.properties() {
        let Some(value) = args.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        check_type(name, schema, value)?;
        check_enum(name, schema, value)?;
    }
    Ok(())
}

fn check_enum(name: &str, schema: &Value, value: &Value) -> Result<(), ValidationError> {
    let Some(allowed) = schema.get("enum").and_then(Value::as_array) else {
        return Ok(());
    };
    if allowed.contains(value) {
        return Ok(());
    }
    Err(ValidationError::NotInEnum {
        field: name.to_string(),
        allowed: allowed
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        actual: value.to_string(),
    })
}

fn check_type(name: &str, schema: &Value, value: &Value) -> Result<(), ValidationError> {
    let declared: Vec<&str> = match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(()),
    };
    if declared.is_empty() || declared.iter().any(|t| matches_type(t, value)) {
        return Ok(());
    }
    Err(ValidationError::WrongType {
        field: name.to_string(),
        expected: declared.join(" | "),
        actual: json_type_name(value),
    })
}

fn matches_type(declared: &str, value: &Value) -> bool {
    match declared {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keywords are not ours to enforce.
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
