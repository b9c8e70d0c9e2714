//! PostgreSQL storage backend
//!
//! One table per entity type, created ahead of time:
//!
//! ```sql
//! CREATE TABLE widgets (
//!     id      BIGSERIAL PRIMARY KEY,
//!     deleted BOOLEAN NOT NULL DEFAULT FALSE,
//!     body    JSONB   NOT NULL
//! );
//! ```
//!
//! Each session lazily opens one transaction. Statements run as soon as they
//! are issued, so flush has nothing left to push; an uncommitted transaction
//! rolls back when the session is dropped.

use std::marker::PhantomData;
use std::time::Duration;

use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use super::error::{DaoError, DaoOperation, DaoResult};
use super::session::{Pagination, Session, Storage};
use crate::config::DatabaseConfig;
use crate::entity::{from_row, to_row, Entity, RecordId};
use crate::error::{sanitize_url, Error, Result};

/// Create a PostgreSQL connection pool, retrying with exponential backoff
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0;
    let base_delay = config.retry_delay();

    loop {
        match try_connect(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Database connection established");
                } else {
                    tracing::info!(
                        max = config.max_connections,
                        min = config.min_connections,
                        "Database connection pool created"
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        attempts = config.max_retries + 1,
                        error = %e,
                        "Failed to connect to database"
                    );
                    return Err(e);
                }

                let delay = backoff(base_delay, attempt);
                tracing::warn!(attempt, error = %e, ?delay, "Database connection attempt failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Retry delay for `attempt` (1-based) with exponential backoff
fn backoff(base: Duration, attempt: u32) -> Duration {
    base * 2_u32.pow(attempt.saturating_sub(1))
}

async fn try_connect(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| {
            Error::Database(format!(
                "Failed to connect to database at '{}' ({}): {}",
                sanitize_url(&config.url),
                categorize_db_error(&e),
                e
            ))
        })
}

fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::Configuration(_) => "configuration error",
        sqlx::Error::Database(_) => "database error",
        sqlx::Error::Io(_) => "network I/O error",
        sqlx::Error::Tls(_) => "TLS error",
        sqlx::Error::PoolTimedOut => "connection pool timeout",
        sqlx::Error::PoolClosed => "connection pool closed",
        sqlx::Error::WorkerCrashed => "database worker crashed",
        _ => "connection error",
    }
}

fn select_one_sql(table: &str) -> String {
    format!(r#"SELECT id, deleted, body FROM "{table}" WHERE id = $1 AND ($2 OR NOT deleted)"#)
}

fn select_many_sql(table: &str) -> String {
    format!(
        r#"SELECT id, deleted, body FROM "{table}" WHERE ($1 OR NOT deleted) ORDER BY id LIMIT $2 OFFSET $3"#
    )
}

fn count_sql(table: &str) -> String {
    format!(r#"SELECT COUNT(*) FROM "{table}" WHERE ($1 OR NOT deleted)"#)
}

fn insert_sql(table: &str) -> String {
    format!(r#"INSERT INTO "{table}" (deleted, body) VALUES ($1, $2) RETURNING id"#)
}

fn update_sql(table: &str) -> String {
    format!(r#"UPDATE "{table}" SET deleted = $2, body = $3 WHERE id = $1"#)
}

fn delete_sql(table: &str) -> String {
    format!(r#"DELETE FROM "{table}" WHERE id = $1"#)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn decode<E: Entity>(row: (RecordId, bool, Value)) -> DaoResult<E> {
    let (id, deleted, body) = row;
    from_row(id, deleted, body).map_err(|e| {
        DaoError::serialization_error(DaoOperation::Get, e.to_string())
            .with_entity(E::NAME, id.to_string())
    })
}

fn encode<E: Entity>(record: &E, operation: DaoOperation) -> DaoResult<(RecordId, bool, Value)> {
    to_row(record).map_err(|e| DaoError::serialization_error(operation, e.to_string()))
}

/// Pool-backed storage for one entity type
pub struct PgStorage<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgStorage<E> {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl<E> Clone for PgStorage<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Storage<E> for PgStorage<E> {
    type Session = PgSession<E>;

    async fn session(&self) -> DaoResult<PgSession<E>> {
        Ok(PgSession {
            pool: self.pool.clone(),
            tx: None,
            _entity: PhantomData,
        })
    }
}

/// One transaction against a [`PgStorage`] table
pub struct PgSession<E> {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PgSession<E> {
    async fn tx(&mut self) -> DaoResult<&mut Transaction<'static, Postgres>> {
        if self.tx.is_none() {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Session))?;
            self.tx = Some(tx);
        }
        self.tx
            .as_mut()
            .ok_or_else(|| DaoError::database_error(DaoOperation::Session, "transaction not open"))
    }
}

impl<E: Entity> Session<E> for PgSession<E> {
    async fn find(&mut self, id: RecordId, include_deleted: bool) -> DaoResult<Option<E>> {
        let sql = select_one_sql(E::TABLE);
        let tx = self.tx().await?;
        let row = sqlx::query_as::<_, (RecordId, bool, Value)>(&sql)
            .bind(id)
            .bind(include_deleted)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Get))?;
        row.map(decode::<E>).transpose()
    }

    async fn list(&mut self, window: Option<Pagination>, include_deleted: bool) -> DaoResult<Vec<E>> {
        let sql = select_many_sql(E::TABLE);
        let (limit, offset) = match window {
            Some(window) => (Some(to_i64(window.limit)), to_i64(window.offset)),
            None => (None, 0),
        };
        let tx = self.tx().await?;
        let rows = sqlx::query_as::<_, (RecordId, bool, Value)>(&sql)
            .bind(include_deleted)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Paginate))?;
        rows.into_iter().map(decode::<E>).collect()
    }

    async fn count(&mut self, include_deleted: bool) -> DaoResult<u64> {
        let sql = count_sql(E::TABLE);
        let tx = self.tx().await?;
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(include_deleted)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Count))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn add(&mut self, mut record: E) -> DaoResult<E> {
        let (_, deleted, body) = encode(&record, DaoOperation::Save)?;
        let sql = insert_sql(E::TABLE);
        let tx = self.tx().await?;
        let id: RecordId = sqlx::query_scalar(&sql)
            .bind(deleted)
            .bind(body)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Save))?;
        record.base_mut().id = id;
        Ok(record)
    }

    async fn merge(&mut self, record: E) -> DaoResult<E> {
        let (id, deleted, body) = encode(&record, DaoOperation::Update)?;
        let sql = update_sql(E::TABLE);
        let tx = self.tx().await?;
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(deleted)
            .bind(body)
            .execute(&mut **tx)
            .await
            .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Update))?;
        if result.rows_affected() == 0 {
            return Err(DaoError::not_found(DaoOperation::Update, E::NAME, id));
        }
        Ok(record)
    }

    async fn delete(&mut self, id: RecordId) -> DaoResult<()> {
        let sql = delete_sql(E::TABLE);
        let tx = self.tx().await?;
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| DaoError::from(e).with_operation(DaoOperation::HardDelete))?;
        Ok(())
    }

    async fn flush(&mut self) -> DaoResult<()> {
        Ok(())
    }

    async fn commit(&mut self) -> DaoResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit()
                .await
                .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Session))?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> DaoResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback()
                .await
                .map_err(|e| DaoError::from(e).with_operation(DaoOperation::Session))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_is_scoped_to_table() {
        assert_eq!(
            select_one_sql("widgets"),
            r#"SELECT id, deleted, body FROM "widgets" WHERE id = $1 AND ($2 OR NOT deleted)"#
        );
        assert!(select_many_sql("widgets").contains("ORDER BY id LIMIT $2 OFFSET $3"));
        assert!(count_sql("widgets").starts_with(r#"SELECT COUNT(*) FROM "widgets""#));
        assert!(insert_sql("widgets").ends_with("RETURNING id"));
        assert!(update_sql("widgets").contains("WHERE id = $1"));
        assert_eq!(delete_sql("widgets"), r#"DELETE FROM "widgets" WHERE id = $1"#);
    }

    #[test]
    fn test_window_conversion_saturates() {
        assert_eq!(to_i64(25), 25);
        assert_eq!(to_i64(u64::MAX), i64::MAX);
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff(base, 1), Duration::from_secs(1));
        assert_eq!(backoff(base, 3), Duration::from_secs(4));
    }

    #[test]
    fn test_categorize_db_error() {
        assert_eq!(categorize_db_error(&sqlx::Error::PoolTimedOut), "connection pool timeout");
        assert_eq!(categorize_db_error(&sqlx::Error::RowNotFound), "connection error");
    }
}
