//! Delete commands

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity::RecordId;
use crate::validator::WriteShape;

/// Transient delete command
///
/// `hard_delete` asks for physical removal. When the entity type forbids it,
/// `stop_at_fail` decides between refusing the request and falling back to a
/// soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeleteRequest {
    /// Target record; an id naming no record fails the lookup, not validation
    pub id: RecordId,
    /// Physically remove the record
    #[serde(default)]
    pub hard_delete: bool,
    /// Refuse instead of falling back to soft delete
    #[serde(default)]
    pub stop_at_fail: bool,
}

impl DeleteRequest {
    /// Soft delete request for `id`
    pub fn soft(id: RecordId) -> Self {
        Self {
            id,
            hard_delete: false,
            stop_at_fail: false,
        }
    }

    /// Hard delete request for `id`
    pub fn hard(id: RecordId) -> Self {
        Self {
            id,
            hard_delete: true,
            stop_at_fail: false,
        }
    }

    /// Refuse rather than fall back when hard delete is forbidden
    #[must_use]
    pub fn stop_at_fail(mut self) -> Self {
        self.stop_at_fail = true;
        self
    }
}

impl WriteShape for DeleteRequest {}

/// What a successful delete actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The `deleted` flag was set
    SoftDeleted,
    /// The record was removed from storage
    HardDeleted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::parse_write;
    use serde_json::json;

    #[test]
    fn test_flags_default_to_false() {
        let request = parse_write::<DeleteRequest>(&json!({"id": 5})).unwrap();
        assert_eq!(request, DeleteRequest::soft(5));
    }

    #[test]
    fn test_builders() {
        let request = DeleteRequest::hard(9).stop_at_fail();
        assert!(request.hard_delete);
        assert!(request.stop_at_fail);
    }

    #[test]
    fn test_any_integer_id_is_accepted() {
        let request = parse_write::<DeleteRequest>(&json!({"id": 0})).unwrap();
        assert_eq!(request, DeleteRequest::soft(0));
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let failure = parse_write::<DeleteRequest>(&json!({"hard_delete": true})).unwrap_err();
        assert_eq!(failure.fields(), vec!["id"]);
    }
}
