//! Storage collaborator traits
//!
//! A [`Storage`] hands out request-scoped [`Session`]s. Writes staged on a
//! session become visible to that session after [`Session::flush`] and to
//! everyone after [`Session::commit`]. Reads flush first.
//!
//! Traits use RPITIT (Return Position Impl Trait In Traits) rather than
//! `async_trait`.

use std::future::Future;

use super::error::DaoResult;
use crate::entity::{Entity, RecordId};

/// Storage window for listing queries
///
/// # Example
///
/// ```rust,ignore
/// use resource_crud::dao::Pagination;
///
/// let window = Pagination::from_skip(2, 25);
/// assert_eq!(window.offset, 50);
/// assert_eq!(window.limit, 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of records to skip
    pub offset: u64,
    /// Maximum number of records to return
    pub limit: u64,
}

impl Pagination {
    /// Create a window from a raw offset
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Window for the first `limit` records
    #[must_use]
    pub const fn first_page(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// Window that skips `skip` whole pages of `limit` records
    #[must_use]
    pub const fn from_skip(skip: u64, limit: u64) -> Self {
        Self {
            offset: skip.saturating_mul(limit),
            limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first_page(25)
    }
}

/// Source of request-scoped sessions for one entity type
pub trait Storage<E: Entity>: Send + Sync + 'static {
    /// Session type handed out per request
    type Session: Session<E>;

    /// Open a new session
    fn session(&self) -> impl Future<Output = DaoResult<Self::Session>> + Send;
}

/// Unit of work over one entity type
///
/// Records are returned in natural order (ascending id).
pub trait Session<E: Entity>: Send {
    /// Point lookup; soft-deleted records are skipped unless `include_deleted`
    fn find(
        &mut self,
        id: RecordId,
        include_deleted: bool,
    ) -> impl Future<Output = DaoResult<Option<E>>> + Send;

    /// Listing, optionally windowed
    fn list(
        &mut self,
        window: Option<Pagination>,
        include_deleted: bool,
    ) -> impl Future<Output = DaoResult<Vec<E>>> + Send;

    /// Number of records
    fn count(&mut self, include_deleted: bool) -> impl Future<Output = DaoResult<u64>> + Send;

    /// Stage an insert; the returned record carries its storage-assigned id
    fn add(&mut self, record: E) -> impl Future<Output = DaoResult<E>> + Send;

    /// Stage an overwrite of an existing record
    fn merge(&mut self, record: E) -> impl Future<Output = DaoResult<E>> + Send;

    /// Stage a physical removal
    fn delete(&mut self, id: RecordId) -> impl Future<Output = DaoResult<()>> + Send;

    /// Push staged writes to storage
    fn flush(&mut self) -> impl Future<Output = DaoResult<()>> + Send;

    /// Make flushed writes durable and visible to other sessions
    fn commit(&mut self) -> impl Future<Output = DaoResult<()>> + Send;

    /// Discard staged and flushed-but-uncommitted writes
    fn rollback(&mut self) -> impl Future<Output = DaoResult<()>> + Send;
}
