//! Data-access layer
//!
//! [`Dao`] performs CRUD for one entity type over a request-scoped
//! [`Session`]. Soft-deleted records are invisible to default reads; hard
//! deletes happen only when the entity's
//! [`HardDeletePolicy`](crate::entity::HardDeletePolicy) allows them.
//!
//! Two storage backends ship with the crate:
//!
//! - [`MemoryStorage`]: in-process table, used by tests and prototypes
//! - `PgStorage`: PostgreSQL via sqlx (requires the `database` feature)

mod data_access;
mod delete;
mod error;
mod memory;
#[cfg(feature = "database")]
mod postgres;
mod session;

pub use data_access::Dao;
pub use delete::{DeleteOutcome, DeleteRequest};
pub use error::{DaoError, DaoErrorKind, DaoOperation, DaoResult};
pub use memory::{MemorySession, MemoryStorage};
#[cfg(feature = "database")]
pub use postgres::{connect, PgSession, PgStorage};
pub use session::{Pagination, Session, Storage};
