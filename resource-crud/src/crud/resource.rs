//! Resource controller

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use super::error::{ApiError, ApiOperation};
use super::query::PageQuery;
use super::response::{DeleteResponse, PageResult};
use crate::config::PaginationConfig;
use crate::dao::{Dao, DaoError, DaoErrorKind, DeleteRequest, Storage};
use crate::entity::{Entity, EntitySchema, HardDeletePolicy, RecordId, UnknownFieldPolicy};
use crate::messages::{keys, MessageRegistry, Vocabulary, RESOURCE_WORD};
use crate::service::{PassThrough, Service, WriteHooks};
use crate::validator::{parse_write, validate_write, Projection, ReadShape, WriteShape};

/// Everything a resource declares about itself
///
/// Shapes are chosen by the [`Crud`] type parameters; the rest lives here.
///
/// # Example
///
/// ```rust,ignore
/// let users = ResourceDescriptor::new(MemoryStorage::<User>::new())
///     .with_name("User")
///     .with_vocabulary(Vocabulary::new().with("NOT_FOUND", "No such user"))
///     .with_hard_delete(HardDeletePolicy::Allowed);
/// ```
pub struct ResourceDescriptor<E: Entity, St: Storage<E>, H: WriteHooks<E> = PassThrough> {
    /// Display name used in messages and error context
    pub name: String,
    /// Storage for the entity type
    pub storage: St,
    /// Pre/post-write hooks
    pub hooks: Arc<H>,
    /// Vocabulary declared by this resource
    pub vocabulary: Vocabulary,
    /// Vocabulary inherited from a parent resource; `vocabulary` wins per key
    pub inherited_vocabulary: Vocabulary,
    /// Whether hard deletes are permitted
    pub hard_delete: HardDeletePolicy,
    /// What to do with unknown payload keys
    pub unknown_fields: UnknownFieldPolicy,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, St: Storage<E>> ResourceDescriptor<E, St, PassThrough> {
    /// Descriptor with identity hooks, no vocabulary and default policies
    pub fn new(storage: St) -> Self {
        Self {
            name: E::NAME.to_string(),
            storage,
            hooks: Arc::new(PassThrough),
            vocabulary: Vocabulary::new(),
            inherited_vocabulary: Vocabulary::new(),
            hard_delete: HardDeletePolicy::default(),
            unknown_fields: UnknownFieldPolicy::default(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity, St: Storage<E>, H: WriteHooks<E>> ResourceDescriptor<E, St, H> {
    /// Set the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the write hooks
    #[must_use]
    pub fn with_hooks<H2: WriteHooks<E>>(self, hooks: H2) -> ResourceDescriptor<E, St, H2> {
        ResourceDescriptor {
            name: self.name,
            storage: self.storage,
            hooks: Arc::new(hooks),
            vocabulary: self.vocabulary,
            inherited_vocabulary: self.inherited_vocabulary,
            hard_delete: self.hard_delete,
            unknown_fields: self.unknown_fields,
            _entity: PhantomData,
        }
    }

    /// Set the declared vocabulary
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Inherit a parent vocabulary
    #[must_use]
    pub fn inheriting(mut self, parent: Vocabulary) -> Self {
        self.inherited_vocabulary = parent;
        self
    }

    /// Set the hard-delete policy
    #[must_use]
    pub fn with_hard_delete(mut self, policy: HardDeletePolicy) -> Self {
        self.hard_delete = policy;
        self
    }

    /// Set the unknown-field policy
    #[must_use]
    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Inherited vocabulary with the declared one merged over it
    pub fn effective_vocabulary(&self) -> Vocabulary {
        self.vocabulary.merged_over(&self.inherited_vocabulary)
    }
}

/// CRUD controller for one resource
///
/// - `E`: entity type
/// - `C`: create write-shape
/// - `U`: update write-shape (carries `id`)
/// - `R`: read-shape, built from `&E`
/// - `St`: storage backend
/// - `H`: write hooks
///
/// Every operation opens its own storage session; nothing is shared between
/// requests except the storage itself.
pub struct Crud<E, C, U, R, St, H = PassThrough>
where
    E: Entity,
    St: Storage<E>,
    H: WriteHooks<E>,
{
    name: String,
    storage: St,
    hooks: Arc<H>,
    schema: Arc<EntitySchema<E>>,
    vocabulary: Vocabulary,
    messages: Arc<MessageRegistry>,
    pagination: PaginationConfig,
    _shapes: PhantomData<fn() -> (C, U, R)>,
}

impl<E, C, U, R, St, H> Crud<E, C, U, R, St, H>
where
    E: Entity,
    C: WriteShape,
    U: WriteShape,
    R: ReadShape + for<'a> From<&'a E>,
    St: Storage<E>,
    H: WriteHooks<E>,
{
    /// Build the controller; the effective vocabulary is fixed here
    pub fn new(descriptor: ResourceDescriptor<E, St, H>, messages: Arc<MessageRegistry>) -> Self {
        let mut vocabulary = descriptor.effective_vocabulary();
        if vocabulary.get(RESOURCE_WORD).is_none() {
            vocabulary.insert(RESOURCE_WORD, descriptor.name.clone());
        }
        let schema = EntitySchema::new()
            .with_hard_delete(descriptor.hard_delete)
            .with_unknown_fields(descriptor.unknown_fields);

        tracing::debug!(
            resource = %descriptor.name,
            fields = ?schema.fields().names(),
            "Resource registered"
        );

        Self {
            name: descriptor.name,
            storage: descriptor.storage,
            hooks: descriptor.hooks,
            schema: Arc::new(schema),
            vocabulary,
            messages,
            pagination: PaginationConfig::default(),
            _shapes: PhantomData,
        }
    }

    /// Override list paging defaults
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective vocabulary
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Paging configuration
    pub fn pagination(&self) -> &PaginationConfig {
        &self.pagination
    }

    /// Storage backend
    pub fn storage(&self) -> &St {
        &self.storage
    }

    /// Resolve a message key against this resource's vocabulary
    pub fn message(&self, key: &str) -> String {
        self.messages.get_message(key, &self.vocabulary)
    }

    async fn service(&self, operation: ApiOperation) -> Result<Service<E, St::Session, H>, ApiError> {
        let session = self
            .storage
            .session()
            .await
            .map_err(|e| self.translate(e, operation))?;
        let dao = Dao::new(session, Arc::clone(&self.schema));
        Ok(Service::new(dao, Arc::clone(&self.hooks)))
    }

    /// Project one visible record
    pub async fn read(&self, id: RecordId) -> Result<Projection<R>, ApiError> {
        let mut service = self.service(ApiOperation::Read).await?;
        let record = service
            .get(id)
            .await
            .map_err(|e| self.translate(e, ApiOperation::Read))?;
        match record {
            Some(record) => Ok(Projection::of(&record)),
            None => Err(self.not_found(ApiOperation::Read, id)),
        }
    }

    /// Page `page` of `limit` visible records, without links
    ///
    /// The Dao skips `page - 1` whole pages, so the offset is
    /// `(page - 1) * limit`. A `page` or `limit` of 0 is read as 1.
    pub async fn index(&self, page: u64, limit: u64) -> Result<PageResult<Projection<R>>, ApiError> {
        let (page, limit) = (page.max(1), limit.max(1));
        let skip = page - 1;
        let mut service = self.service(ApiOperation::Index).await?;
        let (records, total) = service
            .paginate(skip, limit)
            .await
            .map_err(|e| self.translate(e, ApiOperation::Index))?;
        let data = records.iter().map(Projection::of).collect();
        Ok(PageResult::new(page, limit, total, data))
    }

    /// List endpoint: resolve paging, fetch, and link neighbouring pages
    pub async fn index_page(&self, base: &Url, query: PageQuery) -> Result<PageResult<Projection<R>>, ApiError> {
        let (page, limit) = query.resolve(&self.pagination);
        Ok(self.index(page, limit).await?.with_links(base))
    }

    /// Validate against `C`, persist, and project the stored record
    pub async fn create(&self, raw: Value) -> Result<Projection<R>, ApiError> {
        let data = validate_write::<C>(&raw)
            .map_err(|failure| ApiError::validation_failed(ApiOperation::Create, failure))?;
        let mut service = self.service(ApiOperation::Create).await?;
        let record = service
            .create(data)
            .await
            .map_err(|e| self.translate(e, ApiOperation::Create).with_body(raw))?;
        Ok(Projection::of(&record))
    }

    /// Validate against `U`, overwrite the record named by `id`, and project it
    pub async fn update(&self, raw: Value) -> Result<Projection<R>, ApiError> {
        let data = validate_write::<U>(&raw)
            .map_err(|failure| ApiError::validation_failed(ApiOperation::Update, failure))?;
        let mut service = self.service(ApiOperation::Update).await?;
        let record = service
            .update(data)
            .await
            .map_err(|e| self.translate(e, ApiOperation::Update).with_body(raw))?;
        Ok(Projection::of(&record))
    }

    /// Soft or hard delete per the request and the resource's policy
    pub async fn delete(&self, raw: Value) -> Result<DeleteResponse, ApiError> {
        let request = parse_write::<DeleteRequest>(&raw)
            .map_err(|failure| ApiError::validation_failed(ApiOperation::Delete, failure))?;
        let mut service = self.service(ApiOperation::Delete).await?;
        service
            .delete(&request)
            .await
            .map_err(|e| self.translate(e, ApiOperation::Delete))?;
        Ok(DeleteResponse {
            message: self.message(keys::DELETE_SUCCESS),
            id: request.id,
        })
    }

    fn not_found(&self, operation: ApiOperation, id: impl fmt::Display) -> ApiError {
        ApiError::not_found(operation, self.name.clone(), self.message(keys::NOT_FOUND))
            .with_entity(self.name.clone(), id.to_string())
    }

    fn translate(&self, err: DaoError, operation: ApiOperation) -> ApiError {
        let kind = err.kind;
        let error = ApiError::from(err).with_operation(operation);
        let error = ApiError {
            entity_type: Some(self.name.clone()),
            ..error
        };
        match kind {
            DaoErrorKind::NotFound => error.with_message(self.message(keys::NOT_FOUND)),
            DaoErrorKind::OperationNotAllowed => {
                error.with_message(self.message(keys::OPERATION_NOT_ALLOWED))
            }
            _ => error,
        }
    }
}

impl<E, C, U, R, St, H> fmt::Debug for Crud<E, C, U, R, St, H>
where
    E: Entity,
    St: Storage<E>,
    H: WriteHooks<E>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crud")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("vocabulary", &self.vocabulary)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::ApiErrorKind;
    use crate::dao::MemoryStorage;
    use crate::testing::{Widget, WidgetCrud, WidgetView};
    use serde_json::json;

    fn controller(descriptor: ResourceDescriptor<Widget, MemoryStorage<Widget>>) -> WidgetCrud {
        Crud::new(descriptor, Arc::new(MessageRegistry::crud_defaults()))
    }

    fn widgets() -> WidgetCrud {
        controller(ResourceDescriptor::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let crud = widgets();
        let created = crud
            .create(json!({"name": "bolt", "quantity": 3, "secret": "x"}))
            .await
            .unwrap();
        assert_eq!(created.0.id, 1);

        let read = crud.read(1).await.unwrap();
        assert_eq!(
            serde_json::to_value(&read).unwrap(),
            json!({"id": 1, "name": "bolt", "quantity": 3})
        );
    }

    #[tokio::test]
    async fn test_read_missing_uses_vocabulary_message() {
        let crud = widgets();
        let err = crud.read(5).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.message, "Widget not found");
        assert_eq!(err.entity_id.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_declared_vocabulary_overrides_inherited() {
        let parent = Vocabulary::new()
            .with(keys::NOT_FOUND, "Parent text")
            .with(keys::DELETE_SUCCESS, "Gone");
        let crud = controller(
            ResourceDescriptor::new(MemoryStorage::new())
                .inheriting(parent)
                .with_vocabulary(Vocabulary::new().with(keys::NOT_FOUND, "Custom message")),
        );
        assert_eq!(crud.message(keys::NOT_FOUND), "Custom message");
        assert_eq!(crud.message(keys::DELETE_SUCCESS), "Gone");
    }

    #[tokio::test]
    async fn test_index_skips_whole_pages() {
        let crud = widgets();
        for i in 0..15 {
            crud.create(json!({"name": format!("w{}", i), "quantity": i}))
                .await
                .unwrap();
        }
        let page = crud.index(2, 10).await.unwrap();
        assert_eq!(page.total, 15);
        assert_eq!(page.len(), 5);
        assert_eq!(page.data[0].0.id, 11);
    }

    #[tokio::test]
    async fn test_index_reads_zero_page_and_limit_as_one() {
        let crud = widgets();
        for i in 0..3 {
            crud.create(json!({"name": format!("w{}", i)})).await.unwrap();
        }
        let base = Url::parse("http://localhost/widgets").unwrap();
        let page = crud.index(0, 0).await.unwrap().with_links(&base);
        assert_eq!((page.page, page.limit), (1, 1));
        assert_eq!(page.len(), 1);
        assert_eq!(page.prev, None);
        assert_eq!(page.next.as_deref(), Some("http://localhost/widgets?page=2&limit=1"));

        let last = crud.index(3, 0).await.unwrap().with_links(&base);
        assert_eq!(last.next, None);
        assert_eq!(last.prev.as_deref(), Some("http://localhost/widgets?page=2&limit=1"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let crud = widgets();
        let err = crud
            .update(json!({"id": 77, "name": "ghost"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.operation, ApiOperation::Update);
        assert_eq!(err.message, "Widget not found");
    }

    #[tokio::test]
    async fn test_create_validation_failure() {
        let crud = widgets();
        let raw = json!({"name": "", "quantity": 1});
        let err = crud.create(raw.clone()).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::ValidationFailed);
        let failure = err.validation.unwrap();
        assert_eq!(failure.fields(), vec!["name"]);
        assert_eq!(failure.body, raw);
    }

    #[tokio::test]
    async fn test_delete_paths() {
        let crud = widgets();
        crud.create(json!({"name": "a", "quantity": 1})).await.unwrap();

        let err = crud
            .delete(json!({"id": 1, "hard_delete": true, "stop_at_fail": true}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::OperationNotAllowed);
        assert_eq!(err.message, "Operation not allowed on Widget");

        let done = crud.delete(json!({"id": 1})).await.unwrap();
        assert_eq!(done, DeleteResponse { message: "Widget deleted".to_string(), id: 1 });
        assert_eq!(crud.storage().peek(1).unwrap().map(|w| w.is_deleted()), Some(true));

        let err = crud.delete(json!({"id": 1})).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_of_non_positive_id_is_not_found() {
        let crud = widgets();
        let update = crud.update(json!({"id": 0, "name": "x"})).await.unwrap_err();
        let delete = crud.delete(json!({"id": 0})).await.unwrap_err();
        assert_eq!(delete.kind, ApiErrorKind::NotFound);
        assert_eq!(delete.kind, update.kind);
        assert_eq!(delete.message, "Widget not found");
        assert_eq!(delete.entity_id.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_update_accepts_partial_payload() {
        let crud = widgets();
        crud.create(json!({"name": "a", "quantity": 1})).await.unwrap();
        let updated: Projection<WidgetView> = crud.update(json!({"id": 1, "quantity": 4})).await.unwrap();
        assert_eq!(updated.0.quantity, 4);
        assert_eq!(updated.0.name, "a");
    }
}
