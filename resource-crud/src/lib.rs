//! # resource-crud
//!
//! Generic scaffolding for exposing persisted records as REST resources.
//!
//! A resource is assembled from layers that each do one thing:
//!
//! - **Entity**: a record type embedding [`EntityBase`](entity::EntityBase)
//!   (`id` + soft-delete flag) and registering its writable fields
//! - **Dao**: per-request data access with soft/hard delete rules and
//!   pagination ([`dao`])
//! - **Service**: pre/post-write hooks around the Dao ([`service`])
//! - **Validator**: write-shapes validated with the `validator` derive and
//!   read-shapes that always drop their excluded fields ([`validator`])
//! - **Crud**: the axum controller exposing read, list, create, update and
//!   delete ([`crud`])
//! - **Messages**: templated user-facing text resolved against a per-resource
//!   vocabulary ([`messages`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resource_crud::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let messages = Arc::new(MessageRegistry::from_config(&config.messages));
//!     let users: Crud<User, NewUser, UserPatch, UserView, _> = Crud::new(
//!         ResourceDescriptor::new(MemoryStorage::new()),
//!         Arc::clone(&messages),
//!     )
//!     .with_pagination(config.pagination.clone());
//!
//!     let app = Router::new().nest("/users", Arc::new(users).router());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crud;
pub mod dao;
pub mod entity;
pub mod error;
pub mod messages;
pub mod observability;
pub mod service;
pub mod validator;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, MessagesConfig, PaginationConfig, ServiceConfig};
    pub use crate::error::{Error, Result};

    pub use crate::crud::{
        ApiError, ApiErrorKind, ApiOperation, Crud, DeleteResponse, PageQuery, PageResult,
        ResourceDescriptor,
    };
    pub use crate::dao::{
        Dao, DaoError, DaoErrorKind, DaoOperation, DaoResult, DeleteOutcome, DeleteRequest,
        MemoryStorage, Pagination, Session, Storage,
    };
    #[cfg(feature = "database")]
    pub use crate::dao::{connect, PgStorage};
    pub use crate::entity::{
        Entity, EntityBase, EntitySchema, FieldMap, FieldValues, HardDeletePolicy, RecordId,
        UnknownFieldPolicy,
    };
    pub use crate::messages::{keys, MessageRegistry, Vocabulary};
    pub use crate::observability::init_tracing;
    pub use crate::service::{PassThrough, Service, WriteHooks};
    pub use crate::validator::{FieldError, Projection, ReadShape, ValidationFailure, WriteShape};

    pub use axum::Router;
}

/// Fixture resource shared by the unit tests
#[cfg(test)]
pub(crate) mod testing {
    use ::validator::Validate;
    use serde::{Deserialize, Serialize};

    use crate::crud::Crud;
    use crate::dao::MemoryStorage;
    use crate::entity::{Entity, EntityBase, FieldMap, RecordId};
    use crate::validator::{ReadShape, WriteShape};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct Widget {
        #[serde(flatten)]
        pub base: EntityBase,
        pub name: String,
        pub quantity: u32,
        pub secret: Option<String>,
    }

    impl Entity for Widget {
        const NAME: &'static str = "Widget";
        const TABLE: &'static str = "widgets";

        fn base(&self) -> &EntityBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut EntityBase {
            &mut self.base
        }

        fn fields(fields: FieldMap<Self>) -> FieldMap<Self> {
            fields
                .field("name", |w: &mut Widget, name: String| w.name = name)
                .field("quantity", |w: &mut Widget, quantity: u32| w.quantity = quantity)
                .field("secret", |w: &mut Widget, secret: Option<String>| w.secret = secret)
        }
    }

    #[derive(Debug, Serialize, Deserialize, Validate)]
    pub struct NewWidget {
        #[validate(length(min = 1))]
        pub name: String,
        #[validate(range(max = 1000))]
        #[serde(default)]
        pub quantity: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub secret: Option<String>,
        /// Client-side confirmation flag, never stored
        #[serde(default)]
        pub confirm: bool,
    }

    impl WriteShape for NewWidget {
        const EXCLUDE_FIELDS: &'static [&'static str] = &["confirm"];
    }

    #[derive(Debug, Serialize, Deserialize, Validate)]
    pub struct WidgetPatch {
        pub id: RecordId,
        #[validate(length(min = 1))]
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[validate(range(max = 1000))]
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub quantity: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub secret: Option<String>,
    }

    impl WriteShape for WidgetPatch {}

    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct WidgetView {
        pub id: RecordId,
        pub name: String,
        pub quantity: u32,
        pub secret: Option<String>,
    }

    impl ReadShape for WidgetView {
        const EXCLUDE_FIELDS: &'static [&'static str] = &["secret"];
    }

    impl From<&Widget> for WidgetView {
        fn from(widget: &Widget) -> Self {
            Self {
                id: widget.id(),
                name: widget.name.clone(),
                quantity: widget.quantity,
                secret: widget.secret.clone(),
            }
        }
    }

    pub type WidgetCrud = Crud<Widget, NewWidget, WidgetPatch, WidgetView, MemoryStorage<Widget>>;
}
