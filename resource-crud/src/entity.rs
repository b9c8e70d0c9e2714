//! Entity model shared by every resource
//!
//! Every persisted record embeds an [`EntityBase`] (storage-assigned `id` and
//! the soft-delete flag) and registers its writable fields in a [`FieldMap`].
//! The map is turned into an [`EntitySchema`] once, when the resource is
//! registered, and is the only way generic code writes into a record.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     #[serde(flatten)]
//!     base: EntityBase,
//!     email: String,
//! }
//!
//! impl Entity for User {
//!     const NAME: &'static str = "User";
//!     const TABLE: &'static str = "users";
//!
//!     fn base(&self) -> &EntityBase { &self.base }
//!     fn base_mut(&mut self) -> &mut EntityBase { &mut self.base }
//!
//!     fn fields(fields: FieldMap<Self>) -> FieldMap<Self> {
//!         fields.field("email", |user: &mut User, email: String| user.email = email)
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validator::FieldError;

/// Key/value payload flowing from the validators down to the entity
pub type FieldValues = Map<String, Value>;

/// Storage-assigned record identifier
pub type RecordId = i64;

/// Name of the identity key in payloads and serialized records
pub const ID_FIELD: &str = "id";

/// Name of the soft-delete flag in payloads and serialized records
pub const DELETED_FIELD: &str = "deleted";

/// Attributes common to every persisted record
///
/// `id` is `0` until storage assigns one on insert; assigned ids are positive
/// and never reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityBase {
    /// Storage-assigned identifier
    #[serde(default)]
    pub id: RecordId,
    /// Soft-delete flag; deleted records are hidden from default reads
    #[serde(default)]
    pub deleted: bool,
}

/// A persisted record type
///
/// Implementations flatten an [`EntityBase`] into their serialized form so the
/// storage row codec ([`to_row`] / [`from_row`]) can split identity from body.
pub trait Entity: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Display name used in error context (e.g. "User")
    const NAME: &'static str;

    /// Storage table / collection name
    const TABLE: &'static str;

    /// Shared base attributes
    fn base(&self) -> &EntityBase;

    /// Mutable access to the shared base attributes
    fn base_mut(&mut self) -> &mut EntityBase;

    /// Register the resource-specific writable fields
    fn fields(fields: FieldMap<Self>) -> FieldMap<Self>;

    /// Storage-assigned identifier (`0` when not yet persisted)
    fn id(&self) -> RecordId {
        self.base().id
    }

    /// Whether the record is soft-deleted
    fn is_deleted(&self) -> bool {
        self.base().deleted
    }
}

type Setter<E> = Box<dyn Fn(&mut E, Value) -> Result<(), serde_json::Error> + Send + Sync>;

/// Whitelist of writable fields, each with a typed setter
pub struct FieldMap<E> {
    setters: HashMap<&'static str, Setter<E>>,
}

impl<E: 'static> FieldMap<E> {
    /// Create an empty field map
    #[must_use]
    pub fn new() -> Self {
        Self {
            setters: HashMap::new(),
        }
    }

    /// Register a field with its typed setter
    ///
    /// Incoming JSON values are converted to `T` before `set` is called.
    #[must_use]
    pub fn field<T, F>(mut self, name: &'static str, set: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(&mut E, T) + Send + Sync + 'static,
    {
        self.setters.insert(
            name,
            Box::new(move |record: &mut E, value: Value| {
                let value = serde_json::from_value::<T>(value)?;
                set(record, value);
                Ok(())
            }),
        );
        self
    }

    /// Whether `name` is a registered field
    pub fn contains(&self, name: &str) -> bool {
        self.setters.contains_key(name)
    }

    /// Registered field names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.setters.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn assign(&self, record: &mut E, name: &str, value: Value) -> Option<Result<(), serde_json::Error>> {
        self.setters.get(name).map(|set| set(record, value))
    }
}

impl<E: 'static> Default for FieldMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for FieldMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.setters.keys().collect();
        names.sort_unstable();
        f.debug_struct("FieldMap").field("fields", &names).finish()
    }
}

/// What to do with payload keys that name no registered field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Fail the write and list the unknown keys
    #[default]
    Reject,
    /// Skip unknown keys silently
    Ignore,
}

/// Whether records of a type may be physically removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardDeletePolicy {
    /// Hard delete requests are refused (or downgraded to soft delete)
    #[default]
    Forbidden,
    /// Hard delete requests physically remove the record
    Allowed,
}

impl HardDeletePolicy {
    /// Whether hard deletes are permitted
    pub fn allows_hard_delete(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Failure while assigning a payload onto a record
#[derive(Debug, thiserror::Error)]
pub enum AssignError {
    /// Payload keys that are not registered fields
    #[error("unknown field(s): {}", .0.join(", "))]
    UnknownFields(Vec<String>),

    /// A value could not be converted to the field type
    #[error("invalid value for field `{field}`: {source}")]
    InvalidValue {
        /// Offending field
        field: String,
        /// Conversion error
        source: serde_json::Error,
    },
}

impl AssignError {
    /// Field-level detail for the validation response
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            Self::UnknownFields(fields) => fields
                .iter()
                .map(|field| FieldError::new(field.clone(), "unknown_field", "Unknown field"))
                .collect(),
            Self::InvalidValue { field, source } => {
                vec![FieldError::new(field.clone(), "invalid_value", source.to_string())]
            }
        }
    }
}

/// Per-resource write rules, built once at registration time
pub struct EntitySchema<E> {
    fields: FieldMap<E>,
    unknown_fields: UnknownFieldPolicy,
    hard_delete: HardDeletePolicy,
}

impl<E: Entity> EntitySchema<E> {
    /// Build the schema from the entity's registered fields
    ///
    /// The base `deleted` flag is always writable; `id` never is.
    #[must_use]
    pub fn new() -> Self {
        let base = FieldMap::new().field(DELETED_FIELD, |record: &mut E, deleted: bool| {
            record.base_mut().deleted = deleted;
        });
        Self {
            fields: E::fields(base),
            unknown_fields: UnknownFieldPolicy::default(),
            hard_delete: HardDeletePolicy::default(),
        }
    }

    /// Set the unknown-key policy
    #[must_use]
    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Set the hard-delete policy
    #[must_use]
    pub fn with_hard_delete(mut self, policy: HardDeletePolicy) -> Self {
        self.hard_delete = policy;
        self
    }

    /// Registered writable fields
    pub fn fields(&self) -> &FieldMap<E> {
        &self.fields
    }

    /// Unknown-key policy
    pub fn unknown_fields(&self) -> UnknownFieldPolicy {
        self.unknown_fields
    }

    /// Hard-delete policy
    pub fn hard_delete(&self) -> HardDeletePolicy {
        self.hard_delete
    }

    /// Build a fresh, unsaved record from a payload
    pub fn instantiate(&self, data: &FieldValues) -> Result<E, AssignError> {
        let mut record = E::default();
        self.update_from_map(&mut record, data)?;
        Ok(record)
    }

    /// Overwrite every registered field named in `data`
    ///
    /// The `id` key is the identity key and is never assigned. Unknown keys
    /// follow the schema's [`UnknownFieldPolicy`]. The record is left untouched
    /// when any key fails.
    pub fn update_from_map(&self, record: &mut E, data: &FieldValues) -> Result<(), AssignError> {
        if self.unknown_fields == UnknownFieldPolicy::Reject {
            let unknown: Vec<String> = data
                .keys()
                .filter(|key| key.as_str() != ID_FIELD && !self.fields.contains(key))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(AssignError::UnknownFields(unknown));
            }
        }

        let mut staged = record.clone();
        for (key, value) in data {
            if key == ID_FIELD {
                continue;
            }
            if let Some(result) = self.fields.assign(&mut staged, key, value.clone()) {
                result.map_err(|source| AssignError::InvalidValue {
                    field: key.clone(),
                    source,
                })?;
            }
        }

        *record = staged;
        Ok(())
    }
}

impl<E: Entity> Default for EntitySchema<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EntitySchema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("fields", &self.fields)
            .field("unknown_fields", &self.unknown_fields)
            .field("hard_delete", &self.hard_delete)
            .finish()
    }
}

/// Split a record into its storage row: `(id, deleted, body)`
///
/// `body` is the JSON object of resource-specific fields.
pub fn to_row<E: Entity>(record: &E) -> Result<(RecordId, bool, Value), serde_json::Error> {
    let mut body = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "{} must serialize to an object, got {}",
                E::NAME,
                other
            )))
        }
    };
    body.remove(ID_FIELD);
    body.remove(DELETED_FIELD);
    Ok((record.id(), record.is_deleted(), Value::Object(body)))
}

/// Rebuild a record from its storage row
pub fn from_row<E: Entity>(id: RecordId, deleted: bool, body: Value) -> Result<E, serde_json::Error> {
    let mut map = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "{} row body must be an object, got {}",
                E::NAME,
                other
            )))
        }
    };
    map.insert(ID_FIELD.to_string(), Value::from(id));
    map.insert(DELETED_FIELD.to_string(), Value::Bool(deleted));
    serde_json::from_value(Value::Object(map))
}
