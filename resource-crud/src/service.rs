//! Business-service layer
//!
//! [`Service`] is thin orchestration over a [`Dao`]. Create and update pass
//! the payload through [`WriteHooks::before_write`] and the stored record
//! through [`WriteHooks::after_write`]; everything else delegates directly.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Slugify;
//!
//! impl WriteHooks<Article> for Slugify {
//!     fn before_write(&self, mut data: FieldValues) -> FieldValues {
//!         if let Some(Value::String(title)) = data.get("title").cloned() {
//!             data.insert("slug".into(), Value::String(title.to_lowercase().replace(' ', "-")));
//!         }
//!         data
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::dao::{Dao, DaoResult, DeleteOutcome, DeleteRequest, Session};
use crate::entity::{Entity, FieldValues, RecordId};

/// Pre/post-write extension points; both default to identity
pub trait WriteHooks<E: Entity>: Send + Sync + 'static {
    /// Transform the validated payload before it is persisted
    fn before_write(&self, data: FieldValues) -> FieldValues {
        data
    }

    /// Transform the persisted record before it is returned
    fn after_write(&self, record: E) -> E {
        record
    }
}

/// Identity hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<E: Entity> WriteHooks<E> for PassThrough {}

/// Service over one entity type
pub struct Service<E: Entity, S: Session<E>, H: WriteHooks<E> = PassThrough> {
    dao: Dao<E, S>,
    hooks: Arc<H>,
}

impl<E: Entity, S: Session<E>, H: WriteHooks<E>> Service<E, S, H> {
    /// Wrap a Dao with shared hooks
    pub fn new(dao: Dao<E, S>, hooks: Arc<H>) -> Self {
        Self { dao, hooks }
    }

    /// Underlying Dao
    pub fn dao(&mut self) -> &mut Dao<E, S> {
        &mut self.dao
    }

    /// Visible record by id
    pub async fn get(&mut self, id: RecordId) -> DaoResult<Option<E>> {
        self.dao.get(id, false).await
    }

    /// Page of visible records at offset `skip * limit`, plus the visible total
    pub async fn paginate(&mut self, skip: u64, limit: u64) -> DaoResult<(Vec<E>, u64)> {
        let records = self.dao.paginate(skip, limit, false).await?;
        let total = self.dao.count(false).await?;
        Ok((records, total))
    }

    /// Create a record
    pub async fn create(&mut self, data: FieldValues) -> DaoResult<E> {
        let data = self.hooks.before_write(data);
        let record = self.dao.save(&data, true).await?;
        Ok(self.hooks.after_write(record))
    }

    /// Update the record named by `data.id`
    pub async fn update(&mut self, data: FieldValues) -> DaoResult<E> {
        let data = self.hooks.before_write(data);
        let record = self.dao.update(&data, true).await?;
        Ok(self.hooks.after_write(record))
    }

    /// Delete per `request`
    pub async fn delete(&mut self, request: &DeleteRequest) -> DaoResult<DeleteOutcome> {
        self.dao.delete(request, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{MemorySession, MemoryStorage, Storage};
    use crate::entity::EntitySchema;
    use crate::testing::Widget;
    use serde_json::{json, Value};

    struct Stamp;

    impl WriteHooks<Widget> for Stamp {
        fn before_write(&self, mut data: FieldValues) -> FieldValues {
            if let Some(Value::String(name)) = data.get("name").cloned() {
                data.insert("name".to_string(), Value::String(name.to_uppercase()));
            }
            data
        }

        fn after_write(&self, mut record: Widget) -> Widget {
            record.secret = None;
            record
        }
    }

    async fn service<H: WriteHooks<Widget>>(
        storage: &MemoryStorage<Widget>,
        hooks: H,
    ) -> Service<Widget, MemorySession<Widget>, H> {
        let dao = Dao::new(storage.session().await.unwrap(), Arc::new(EntitySchema::new()));
        Service::new(dao, Arc::new(hooks))
    }

    fn data(value: Value) -> FieldValues {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_pass_through_is_identity() {
        let storage = MemoryStorage::new();
        let mut service = service(&storage, PassThrough).await;
        let record = service
            .create(data(json!({"name": "bolt", "secret": "s"})))
            .await
            .unwrap();
        assert_eq!(record.name, "bolt");
        assert_eq!(record.secret.as_deref(), Some("s"));
    }

    #[tokio::test]
    async fn test_hooks_wrap_create_and_update() {
        let storage = MemoryStorage::new();
        let mut service = service(&storage, Stamp).await;
        let record = service
            .create(data(json!({"name": "bolt", "secret": "s"})))
            .await
            .unwrap();
        assert_eq!(record.name, "BOLT");
        assert!(record.secret.is_none());
        // before_write output is what was stored
        assert_eq!(storage.peek(record.id()).unwrap().unwrap().secret.as_deref(), Some("s"));

        let updated = service
            .update(data(json!({"id": record.id(), "name": "nut"})))
            .await
            .unwrap();
        assert_eq!(updated.name, "NUT");
    }

    #[tokio::test]
    async fn test_paginate_returns_total() {
        let storage = MemoryStorage::new();
        let mut service = service(&storage, PassThrough).await;
        for i in 0..5 {
            service
                .create(data(json!({"name": format!("w{}", i)})))
                .await
                .unwrap();
        }
        service.delete(&DeleteRequest::soft(1)).await.unwrap();

        let (records, total) = service.paginate(0, 3).await.unwrap();
        assert_eq!(total, 4);
        let ids: Vec<_> = records.iter().map(|w| w.id()).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert!(service.get(1).await.unwrap().is_none());
        assert!(service.dao().get(1, true).await.unwrap().is_some());
    }
}
