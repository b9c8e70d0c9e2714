//! Resource controllers
//!
//! A [`Crud`] binds a storage backend, write hooks, a create shape, an update
//! shape and a read shape into a full HTTP resource: read-one, paginated
//! list, create, update and delete. Domain failures become [`ApiError`]s whose
//! user-facing text comes from the resource's vocabulary.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resource_crud::prelude::*;
//!
//! let messages = Arc::new(MessageRegistry::from_config(&config.messages));
//!
//! let users: Crud<User, NewUser, UserPatch, UserView, _> = Crud::new(
//!     ResourceDescriptor::new(MemoryStorage::new())
//!         .with_vocabulary(Vocabulary::new().with("resource", "User")),
//!     Arc::clone(&messages),
//! )
//! .with_pagination(config.pagination.clone());
//!
//! let app = Router::new().nest("/users", Arc::new(users).router());
//! ```

mod error;
mod query;
mod resource;
mod response;
mod router;

pub use error::{ApiError, ApiErrorKind, ApiOperation};
pub use query::{PageQuery, DEFAULT_PAGE};
pub use resource::{Crud, ResourceDescriptor};
pub use response::{page_link, DeleteResponse, PageResult};
pub use router::request_url;
