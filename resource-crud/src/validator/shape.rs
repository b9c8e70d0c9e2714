//! Write-shapes and read-shapes

use serde::{de::DeserializeOwned, ser::Error as _, Serialize, Serializer};
use serde_json::Value;
use validator::Validate;

use super::error::{FieldError, ValidationFailure};
use crate::entity::FieldValues;

/// Shape accepted on create / update
///
/// `EXCLUDE_FIELDS` names fields the shape accepts but that are metadata only;
/// they are stripped before the payload reaches the service.
pub trait WriteShape: DeserializeOwned + Serialize + Validate + Send + 'static {
    /// Fields removed from the validated payload
    const EXCLUDE_FIELDS: &'static [&'static str] = &[];
}

/// Shape projected on output
///
/// Construction from a record goes through `From<&E>`. `EXCLUDE_FIELDS` are
/// always stripped from the serialized form.
pub trait ReadShape: Serialize + Send + Sync + 'static {
    /// Fields never serialized
    const EXCLUDE_FIELDS: &'static [&'static str] = &[];
}

/// Deserialize and validate `raw` into `W`
pub fn parse_write<W: WriteShape>(raw: &Value) -> Result<W, ValidationFailure> {
    let shape: W = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationFailure::from_deserialize(&e, raw.clone()))?;
    shape
        .validate()
        .map_err(|e| ValidationFailure::from_rules(&e, raw.clone()))?;
    Ok(shape)
}

/// Validate `raw` against `W` and return the accepted key/value payload
///
/// The payload is `W` re-serialized, so only keys `W` declares survive, minus
/// `W::EXCLUDE_FIELDS`.
pub fn validate_write<W: WriteShape>(raw: &Value) -> Result<FieldValues, ValidationFailure> {
    let shape = parse_write::<W>(raw)?;
    let mut payload = match serde_json::to_value(&shape) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(ValidationFailure::new(
                vec![FieldError::new("", "invalid_type", "Expected a JSON object")],
                raw.clone(),
            ))
        }
        Err(e) => {
            return Err(ValidationFailure::new(
                vec![FieldError::new("", "invalid_type", e.to_string())],
                raw.clone(),
            ))
        }
    };
    for field in W::EXCLUDE_FIELDS {
        payload.remove(*field);
    }
    Ok(payload)
}

/// A read-shape ready for output
///
/// # Example
///
/// ```rust,ignore
/// let view = Projection::<UserView>::of(&user);
/// let body = view.dump(&["email"])?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Projection<R>(pub R);

impl<R: ReadShape> Projection<R> {
    /// Project a persisted record
    pub fn of<E>(record: &E) -> Self
    where
        R: for<'a> From<&'a E>,
    {
        Self(R::from(record))
    }

    /// Serialize with the shape's excludes stripped
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        self.dump(&[])
    }

    /// Serialize with the shape's excludes and `extra` stripped
    pub fn dump(&self, extra: &[&str]) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.0)?;
        if let Value::Object(map) = &mut value {
            for field in R::EXCLUDE_FIELDS.iter().chain(extra.iter()) {
                map.remove(*field);
            }
        }
        Ok(value)
    }

    /// Unwrap the shape
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: ReadShape> Serialize for Projection<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}
