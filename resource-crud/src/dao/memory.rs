//! In-process storage backend
//!
//! All sessions of one [`MemoryStorage`] share a table of committed rows. A
//! session stages writes until flush, then holds flushed rows in a private
//! overlay that only its own reads see. Commit applies the overlay to the
//! table; rollback, or dropping the session, discards it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{DaoError, DaoOperation, DaoResult};
use super::session::{Pagination, Session, Storage};
use crate::entity::{Entity, RecordId};

struct Table<E> {
    rows: BTreeMap<RecordId, E>,
    next_id: RecordId,
}

type SharedTable<E> = Arc<Mutex<Table<E>>>;

fn lock<E>(table: &SharedTable<E>) -> DaoResult<MutexGuard<'_, Table<E>>> {
    table
        .lock()
        .map_err(|_| DaoError::database_error(DaoOperation::Session, "memory table lock poisoned"))
}

/// Shared in-memory table for one entity type
pub struct MemoryStorage<E> {
    table: SharedTable<E>,
}

impl<E: Entity> MemoryStorage<E> {
    /// Create an empty table; the first assigned id is 1
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Committed row by id, including soft-deleted rows
    pub fn peek(&self, id: RecordId) -> DaoResult<Option<E>> {
        Ok(lock(&self.table)?.rows.get(&id).cloned())
    }

    /// Number of physically present rows
    pub fn len(&self) -> DaoResult<usize> {
        Ok(lock(&self.table)?.rows.len())
    }

    /// Whether no rows are present
    pub fn is_empty(&self) -> DaoResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<E: Entity> Default for MemoryStorage<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for MemoryStorage<E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<E> fmt::Debug for MemoryStorage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage").finish_non_exhaustive()
    }
}

impl<E: Entity> Storage<E> for MemoryStorage<E> {
    type Session = MemorySession<E>;

    async fn session(&self) -> DaoResult<MemorySession<E>> {
        Ok(MemorySession {
            table: Arc::clone(&self.table),
            pending: Vec::new(),
            overlay: BTreeMap::new(),
        })
    }
}

enum Pending<E> {
    Write(E),
    Delete(RecordId),
}

/// Session over a [`MemoryStorage`] table
pub struct MemorySession<E> {
    table: SharedTable<E>,
    pending: Vec<Pending<E>>,
    /// Flushed, uncommitted rows; `None` marks a physical removal
    overlay: BTreeMap<RecordId, Option<E>>,
}

impl<E: Entity> MemorySession<E> {
    fn flush_pending(&mut self) {
        for op in self.pending.drain(..) {
            match op {
                Pending::Write(record) => {
                    self.overlay.insert(record.id(), Some(record));
                }
                Pending::Delete(id) => {
                    self.overlay.insert(id, None);
                }
            }
        }
    }

    /// Committed rows with this session's overlay on top, in id order
    fn visible(&self, table: &Table<E>, include_deleted: bool) -> Vec<E> {
        let mut rows: BTreeMap<RecordId, &E> = table.rows.iter().map(|(id, row)| (*id, row)).collect();
        for (id, staged) in &self.overlay {
            match staged {
                Some(row) => {
                    rows.insert(*id, row);
                }
                None => {
                    rows.remove(id);
                }
            }
        }
        rows.into_values()
            .filter(|record| include_deleted || !record.is_deleted())
            .cloned()
            .collect()
    }

    fn discard(&mut self) {
        self.pending.clear();
        self.overlay.clear();
    }
}

impl<E: Entity> Session<E> for MemorySession<E> {
    async fn find(&mut self, id: RecordId, include_deleted: bool) -> DaoResult<Option<E>> {
        self.flush_pending();
        let record = match self.overlay.get(&id) {
            Some(staged) => staged.clone(),
            None => lock(&self.table)?.rows.get(&id).cloned(),
        };
        Ok(record.filter(|record| include_deleted || !record.is_deleted()))
    }

    async fn list(&mut self, window: Option<Pagination>, include_deleted: bool) -> DaoResult<Vec<E>> {
        self.flush_pending();
        let visible = {
            let table = lock(&self.table)?;
            self.visible(&table, include_deleted)
        };
        let records = match window {
            Some(window) => visible
                .into_iter()
                .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(window.limit).unwrap_or(usize::MAX))
                .collect(),
            None => visible,
        };
        Ok(records)
    }

    async fn count(&mut self, include_deleted: bool) -> DaoResult<u64> {
        self.flush_pending();
        let table = lock(&self.table)?;
        Ok(self.visible(&table, include_deleted).len() as u64)
    }

    async fn add(&mut self, mut record: E) -> DaoResult<E> {
        {
            let mut table = lock(&self.table)?;
            record.base_mut().id = table.next_id;
            table.next_id += 1;
        }
        self.pending.push(Pending::Write(record.clone()));
        Ok(record)
    }

    async fn merge(&mut self, record: E) -> DaoResult<E> {
        if record.id() <= 0 {
            return Err(DaoError::not_found(DaoOperation::Update, E::NAME, record.id()));
        }
        self.pending.push(Pending::Write(record.clone()));
        Ok(record)
    }

    async fn delete(&mut self, id: RecordId) -> DaoResult<()> {
        self.pending.push(Pending::Delete(id));
        Ok(())
    }

    async fn flush(&mut self) -> DaoResult<()> {
        self.flush_pending();
        Ok(())
    }

    async fn commit(&mut self) -> DaoResult<()> {
        self.flush_pending();
        if self.overlay.is_empty() {
            return Ok(());
        }
        let mut table = lock(&self.table)?;
        for (id, staged) in std::mem::take(&mut self.overlay) {
            match staged {
                Some(record) => {
                    table.rows.insert(id, record);
                }
                None => {
                    table.rows.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DaoResult<()> {
        self.discard();
        Ok(())
    }
}

impl<E> Drop for MemorySession<E> {
    fn drop(&mut self) {
        if !self.pending.is_empty() || !self.overlay.is_empty() {
            tracing::debug!(
                staged = self.pending.len() + self.overlay.len(),
                "Discarding uncommitted memory session"
            );
        }
    }
}
