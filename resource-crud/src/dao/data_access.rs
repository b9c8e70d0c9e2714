//! Generic data-access object

use std::sync::Arc;

use serde_json::Value;

use super::delete::{DeleteOutcome, DeleteRequest};
use super::error::{DaoError, DaoOperation, DaoResult};
use super::session::{Pagination, Session};
use crate::entity::{Entity, EntitySchema, FieldValues, RecordId, ID_FIELD};

/// CRUD over one entity type within one storage session
///
/// Every mutating call flushes immediately and commits unless `commit` is
/// `false`; pass `false` to compose several calls into one unit of work and
/// finish with [`Dao::commit`].
///
/// # Example
///
/// ```rust,ignore
/// let session = storage.session().await?;
/// let mut dao = Dao::new(session, schema.clone());
///
/// let user = dao.save(&payload, true).await?;
/// let page = dao.paginate(0, 25, false).await?;
/// ```
pub struct Dao<E: Entity, S: Session<E>> {
    session: S,
    schema: Arc<EntitySchema<E>>,
}

impl<E: Entity, S: Session<E>> Dao<E, S> {
    /// Bind a session to an entity schema
    pub fn new(session: S, schema: Arc<EntitySchema<E>>) -> Self {
        Self { session, schema }
    }

    /// Write rules for the entity type
    pub fn schema(&self) -> &EntitySchema<E> {
        &self.schema
    }

    /// Underlying session
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Release the session
    pub fn into_session(self) -> S {
        self.session
    }

    /// Point lookup; soft-deleted records are absent unless `include_deleted`
    pub async fn get(&mut self, id: RecordId, include_deleted: bool) -> DaoResult<Option<E>> {
        self.session
            .find(id, include_deleted)
            .await
            .map_err(|e| e.with_operation(DaoOperation::Get))
    }

    /// Every record, soft-deleted ones included
    pub async fn all(&mut self) -> DaoResult<Vec<E>> {
        self.session
            .list(None, true)
            .await
            .map_err(|e| e.with_operation(DaoOperation::All))
    }

    /// Records at offset `skip * limit`, at most `limit` of them
    pub async fn paginate(&mut self, skip: u64, limit: u64, include_deleted: bool) -> DaoResult<Vec<E>> {
        let window = Pagination::from_skip(skip, limit);
        tracing::debug!(
            entity = E::NAME,
            offset = window.offset,
            limit = window.limit,
            "Paginating records"
        );
        self.session
            .list(Some(window), include_deleted)
            .await
            .map_err(|e| e.with_operation(DaoOperation::Paginate))
    }

    /// Number of records visible under `include_deleted`
    pub async fn count(&mut self, include_deleted: bool) -> DaoResult<u64> {
        self.session
            .count(include_deleted)
            .await
            .map_err(|e| e.with_operation(DaoOperation::Count))
    }

    /// Create a record from `data` and persist it
    pub async fn save(&mut self, data: &FieldValues, commit: bool) -> DaoResult<E> {
        let record = self
            .schema
            .instantiate(data)
            .map_err(|e| DaoError::assignment(DaoOperation::Save, E::NAME, &e))?;
        let record = self
            .session
            .add(record)
            .await
            .map_err(|e| e.with_operation(DaoOperation::Save))?;
        self.finish(commit, DaoOperation::Save).await?;
        tracing::info!(entity = E::NAME, id = record.id(), "Record created");
        Ok(record)
    }

    /// Overwrite the record named by `data.id` with the rest of `data`
    ///
    /// Fails with `NotFound` when `id` is missing, not an integer, or names no
    /// visible record.
    pub async fn update(&mut self, data: &FieldValues, commit: bool) -> DaoResult<E> {
        let id = match data.get(ID_FIELD).and_then(Value::as_i64) {
            Some(id) => id,
            None => {
                let shown = data
                    .get(ID_FIELD)
                    .map(Value::to_string)
                    .unwrap_or_else(|| "none".to_string());
                return Err(DaoError::not_found(DaoOperation::Update, E::NAME, shown));
            }
        };

        let mut record = self
            .get(id, false)
            .await?
            .ok_or_else(|| DaoError::not_found(DaoOperation::Update, E::NAME, id))?;
        self.schema
            .update_from_map(&mut record, data)
            .map_err(|e| DaoError::assignment(DaoOperation::Update, E::NAME, &e).with_entity(E::NAME, id.to_string()))?;
        let record = self
            .session
            .merge(record)
            .await
            .map_err(|e| e.with_operation(DaoOperation::Update))?;
        self.finish(commit, DaoOperation::Update).await?;
        tracing::info!(entity = E::NAME, id, "Record updated");
        Ok(record)
    }

    /// Soft or hard delete per `request` and the schema's hard-delete policy
    ///
    /// A hard delete on a type that forbids it falls back to a soft delete,
    /// or fails with `OperationNotAllowed` when `stop_at_fail` is set.
    pub async fn delete(&mut self, request: &DeleteRequest, commit: bool) -> DaoResult<DeleteOutcome> {
        let mut record = self
            .get(request.id, false)
            .await?
            .ok_or_else(|| {
                let operation = if request.hard_delete {
                    DaoOperation::HardDelete
                } else {
                    DaoOperation::SoftDelete
                };
                DaoError::not_found(operation, E::NAME, request.id)
            })?;

        let hard = if request.hard_delete && !self.schema.hard_delete().allows_hard_delete() {
            if request.stop_at_fail {
                tracing::warn!(entity = E::NAME, id = request.id, "Hard delete refused");
                return Err(DaoError::operation_not_allowed(E::NAME, request.id));
            }
            tracing::debug!(
                entity = E::NAME,
                id = request.id,
                "Hard delete not allowed, falling back to soft delete"
            );
            false
        } else {
            request.hard_delete
        };

        let outcome = if hard {
            self.session
                .delete(request.id)
                .await
                .map_err(|e| e.with_operation(DaoOperation::HardDelete))?;
            self.finish(commit, DaoOperation::HardDelete).await?;
            DeleteOutcome::HardDeleted
        } else {
            record.base_mut().deleted = true;
            self.session
                .merge(record)
                .await
                .map_err(|e| e.with_operation(DaoOperation::SoftDelete))?;
            self.finish(commit, DaoOperation::SoftDelete).await?;
            DeleteOutcome::SoftDeleted
        };

        tracing::info!(entity = E::NAME, id = request.id, outcome = ?outcome, "Record deleted");
        Ok(outcome)
    }

    /// Commit the session
    pub async fn commit(&mut self) -> DaoResult<()> {
        self.session.commit().await
    }

    /// Roll the session back
    pub async fn rollback(&mut self) -> DaoResult<()> {
        self.session.rollback().await
    }

    async fn finish(&mut self, commit: bool, operation: DaoOperation) -> DaoResult<()> {
        self.session
            .flush()
            .await
            .map_err(|e| e.with_operation(operation))?;
        if commit {
            self.session
                .commit()
                .await
                .map_err(|e| e.with_operation(operation))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{DaoErrorKind, MemorySession, MemoryStorage, Storage};
    use crate::entity::HardDeletePolicy;
    use crate::testing::Widget;
    use serde_json::json;

    fn data(value: Value) -> FieldValues {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn dao_with(
        storage: &MemoryStorage<Widget>,
        schema: EntitySchema<Widget>,
    ) -> Dao<Widget, MemorySession<Widget>> {
        Dao::new(storage.session().await.unwrap(), Arc::new(schema))
    }

    async fn seeded(count: usize) -> (MemoryStorage<Widget>, Dao<Widget, MemorySession<Widget>>) {
        let storage = MemoryStorage::new();
        let mut dao = dao_with(&storage, EntitySchema::new()).await;
        for i in 0..count {
            dao.save(&data(json!({"name": format!("w{}", i)})), true)
                .await
                .unwrap();
        }
        (storage, dao)
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_commits() {
        let (storage, mut dao) = seeded(0).await;
        let record = dao
            .save(&data(json!({"name": "bolt", "quantity": 2})), true)
            .await
            .unwrap();
        assert_eq!(record.id(), 1);
        assert_eq!(storage.peek(1).unwrap().unwrap().name, "bolt");
    }

    #[tokio::test]
    async fn test_save_without_commit_is_discarded_with_session() {
        let storage = MemoryStorage::<Widget>::new();
        {
            let mut dao = dao_with(&storage, EntitySchema::new()).await;
            let draft = dao.save(&data(json!({"name": "draft"})), false).await.unwrap();
            // flushed: visible to this session only
            assert!(dao.get(draft.id(), false).await.unwrap().is_some());
            assert!(storage.is_empty().unwrap());
        }
        assert!(storage.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_fields() {
        let (_, mut dao) = seeded(0).await;
        let err = dao
            .save(&data(json!({"name": "x", "colour": "red"})), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind, DaoErrorKind::ValidationFailed);
        assert_eq!(err.field_errors[0].field, "colour");
    }

    #[tokio::test]
    async fn test_update_overwrites_fields() {
        let (_, mut dao) = seeded(1).await;
        let record = dao
            .update(&data(json!({"id": 1, "quantity": 8})), true)
            .await
            .unwrap();
        assert_eq!(record.quantity, 8);
        assert_eq!(record.name, "w0");
        assert_eq!(dao.get(1, false).await.unwrap().unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let (_, mut dao) = seeded(1).await;
        let err = dao
            .update(&data(json!({"id": 42, "name": "x"})), true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.operation, DaoOperation::Update);
        assert_eq!(err.entity_id.as_deref(), Some("42"));

        let err = dao.update(&data(json!({"name": "x"})), true).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_paginate_offset_is_skip_times_limit() {
        let (_, mut dao) = seeded(7).await;
        let page = dao.paginate(1, 3, false).await.unwrap();
        let ids: Vec<_> = page.iter().map(|w| w.id()).collect();
        assert_eq!(ids, vec![4, 5, 6]);
        let last = dao.paginate(2, 3, false).await.unwrap();
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_record() {
        let (storage, mut dao) = seeded(2).await;
        let outcome = dao.delete(&DeleteRequest::soft(1), true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::SoftDeleted);
        assert!(dao.get(1, false).await.unwrap().is_none());
        assert!(dao.get(1, true).await.unwrap().is_some());
        assert_eq!(dao.count(false).await.unwrap(), 1);
        assert_eq!(dao.count(true).await.unwrap(), 2);
        assert_eq!(dao.all().await.unwrap().len(), 2);
        assert!(storage.peek(1).unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_delete_missing_record_is_not_found() {
        let (_, mut dao) = seeded(1).await;
        let err = dao.delete(&DeleteRequest::soft(9), true).await.unwrap_err();
        assert!(err.is_not_found());

        dao.delete(&DeleteRequest::soft(1), true).await.unwrap();
        let err = dao.delete(&DeleteRequest::soft(1), true).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_forbidden_hard_delete_falls_back_to_soft() {
        let (storage, mut dao) = seeded(1).await;
        let outcome = dao.delete(&DeleteRequest::hard(1), true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::SoftDeleted);
        assert!(storage.peek(1).unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_forbidden_hard_delete_with_stop_at_fail() {
        let (storage, mut dao) = seeded(1).await;
        let err = dao
            .delete(&DeleteRequest::hard(1).stop_at_fail(), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind, DaoErrorKind::OperationNotAllowed);
        assert!(!storage.peek(1).unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn test_allowed_hard_delete_removes_record() {
        let storage = MemoryStorage::<Widget>::new();
        let schema = EntitySchema::new().with_hard_delete(HardDeletePolicy::Allowed);
        let mut dao = dao_with(&storage, schema).await;
        dao.save(&data(json!({"name": "x"})), true).await.unwrap();
        let outcome = dao.delete(&DeleteRequest::hard(1), true).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::HardDeleted);
        assert!(storage.peek(1).unwrap().is_none());
    }
}
