//! Validation error types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Field-level validation error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name (nested fields are dotted, list items indexed: `items[2].name`)
    pub field: String,
    /// Error code (e.g. "length", "range", "unknown_field")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A write payload rejected by its write-shape
///
/// Carries the raw field-level error list and the original request body so
/// the transport layer can echo both back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    /// Offending fields
    pub errors: Vec<FieldError>,
    /// Request body as received
    pub body: Value,
}

impl ValidationFailure {
    /// Create a failure for `body`
    pub fn new(errors: Vec<FieldError>, body: Value) -> Self {
        Self { errors, body }
    }

    /// Failure for a body that could not be read into the write-shape at all
    pub fn from_deserialize(err: &serde_json::Error, body: Value) -> Self {
        let field = missing_field(err).unwrap_or_default();
        Self::new(vec![FieldError::new(field, "invalid_type", err.to_string())], body)
    }

    /// Failure built from `validator` rule violations
    pub fn from_rules(errors: &ValidationErrors, body: Value) -> Self {
        let mut collected = Vec::new();
        flatten(errors, "", &mut collected);
        collected.sort_by(|a, b| a.field.cmp(&b.field));
        Self::new(collected, body)
    }

    /// Names of the offending fields
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed")?;
        if !self.errors.is_empty() {
            write!(f, ": {}", self.fields().join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

fn missing_field(err: &serde_json::Error) -> Option<String> {
    let text = err.to_string();
    let rest = text.strip_prefix("missing field `")?;
    rest.split('`').next().map(str::to_string)
}

fn flatten(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code));
                    out.push(FieldError::new(path.clone(), error.code.to_string(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use validator::ValidationError;

    #[test]
    fn test_from_rules_flattens_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("quantity", ValidationError::new("range"));
        let mut named = ValidationError::new("length");
        named.message = Some("Name is required".into());
        errors.add("name", named);

        let failure = ValidationFailure::from_rules(&errors, json!({"name": ""}));
        assert_eq!(failure.fields(), vec!["name", "quantity"]);
        assert_eq!(failure.errors[0].message, "Name is required");
        assert_eq!(failure.errors[1].code, "range");
        assert_eq!(failure.body, json!({"name": ""}));
    }

    #[test]
    fn test_from_deserialize_names_missing_field() {
        let err = serde_json::from_value::<std::collections::HashMap<String, u8>>(json!(1))
            .unwrap_err();
        let failure = ValidationFailure::from_deserialize(&err, json!(1));
        assert_eq!(failure.errors.len(), 1);
        assert_eq!(failure.errors[0].code, "invalid_type");
        assert_eq!(failure.errors[0].field, "");

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            id: i64,
        }
        let err = serde_json::from_value::<Needs>(json!({})).unwrap_err();
        let failure = ValidationFailure::from_deserialize(&err, json!({}));
        assert_eq!(failure.errors[0].field, "id");
    }

    #[test]
    fn test_display_lists_fields() {
        let failure = ValidationFailure::new(
            vec![FieldError::new("name", "length", "too short")],
            Value::Null,
        );
        assert_eq!(failure.to_string(), "Validation failed: name");
    }
}
