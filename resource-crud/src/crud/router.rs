//! HTTP surface of a resource controller
//!
//! | Method | Path    | Operation          |
//! |--------|---------|--------------------|
//! | GET    | `/{id}` | [`Crud::read`]     |
//! | GET    | `/`     | [`Crud::index_page`] |
//! | POST   | `/`     | [`Crud::create`]   |
//! | PUT    | `/`     | [`Crud::update`]   |
//! | DELETE | `/`     | [`Crud::delete`]   |
//!
//! Mount one router per resource with `Router::nest`.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        OriginalUri, Path, Query, State,
    },
    http::{header, HeaderMap, Uri},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use url::Url;

use super::error::{ApiError, ApiOperation};
use super::query::PageQuery;
use super::resource::Crud;
use super::response::{DeleteResponse, PageResult};
use crate::dao::Storage;
use crate::entity::{Entity, RecordId};
use crate::service::WriteHooks;
use crate::validator::{Projection, ReadShape, WriteShape};

const FALLBACK_ORIGIN: &str = "http://localhost";

/// Absolute URL of the current request, query dropped
///
/// The origin is `public_url` when configured, else `http://{Host}`.
pub fn request_url(public_url: Option<&str>, headers: &HeaderMap, uri: &Uri) -> Result<Url, ApiError> {
    let origin = match public_url {
        Some(origin) => origin.to_string(),
        None => headers
            .get(header::HOST)
            .and_then(|host| host.to_str().ok())
            .map(|host| format!("http://{}", host))
            .unwrap_or_else(|| FALLBACK_ORIGIN.to_string()),
    };

    let mut url = Url::parse(&origin)
        .map_err(|e| ApiError::bad_request(ApiOperation::Index, format!("Invalid request URL: {}", e)))?;
    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{}{}", prefix, uri.path()));
    url.set_query(None);
    Ok(url)
}

fn body_or_reject(body: Result<Json<Value>, JsonRejection>, operation: ApiOperation) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(operation, rejection.body_text()))
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
    /// Router exposing the five endpoints, wrapped in a trace layer
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(
                "/{id}",
                get(
                    |State(crud): State<Arc<Self>>, id: Result<Path<RecordId>, PathRejection>| async move {
                        crud.read_endpoint(id).await
                    },
                ),
            )
            .route(
                "/",
                get(
                    |State(crud): State<Arc<Self>>,
                     OriginalUri(uri): OriginalUri,
                     headers: HeaderMap,
                     query: Result<Query<PageQuery>, QueryRejection>| async move {
                        crud.index_endpoint(&uri, &headers, query).await
                    },
                )
                .post(
                    |State(crud): State<Arc<Self>>, body: Result<Json<Value>, JsonRejection>| async move {
                        crud.create_endpoint(body).await
                    },
                )
                .put(
                    |State(crud): State<Arc<Self>>, body: Result<Json<Value>, JsonRejection>| async move {
                        crud.update_endpoint(body).await
                    },
                )
                .delete(
                    |State(crud): State<Arc<Self>>, body: Result<Json<Value>, JsonRejection>| async move {
                        crud.delete_endpoint(body).await
                    },
                ),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    async fn read_endpoint(
        &self,
        id: Result<Path<RecordId>, PathRejection>,
    ) -> Result<Json<Projection<R>>, ApiError> {
        let Path(id) =
            id.map_err(|rejection| ApiError::bad_request(ApiOperation::Read, rejection.body_text()))?;
        self.read(id).await.map(Json)
    }

    async fn index_endpoint(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        query: Result<Query<PageQuery>, QueryRejection>,
    ) -> Result<Json<PageResult<Projection<R>>>, ApiError> {
        let Query(query) =
            query.map_err(|rejection| ApiError::bad_request(ApiOperation::Index, rejection.body_text()))?;
        let base = request_url(self.pagination().public_url.as_deref(), headers, uri)?;
        self.index_page(&base, query).await.map(Json)
    }

    async fn create_endpoint(
        &self,
        body: Result<Json<Value>, JsonRejection>,
    ) -> Result<Json<Projection<R>>, ApiError> {
        let raw = body_or_reject(body, ApiOperation::Create)?;
        self.create(raw).await.map(Json)
    }

    async fn update_endpoint(
        &self,
        body: Result<Json<Value>, JsonRejection>,
    ) -> Result<Json<Projection<R>>, ApiError> {
        let raw = body_or_reject(body, ApiOperation::Update)?;
        self.update(raw).await.map(Json)
    }

    async fn delete_endpoint(
        &self,
        body: Result<Json<Value>, JsonRejection>,
    ) -> Result<Json<DeleteResponse>, ApiError> {
        let raw = body_or_reject(body, ApiOperation::Delete)?;
        self.delete(raw).await.map(Json)
    }
}
