//! Session handles for catalog queries.
//!
//! The catalog reader never owns a connection: it borrows a [`Session`], so
//! callers decide pooling and lifetime, and tests can stand in their own
//! implementation. Every query issued through [`TracedSession`] is logged via
//! tracing with the SQL text, parameter count, and row count.
//!
//! The surface is read-only by construction: there is no `execute`. One
//! session is one logical connection; accessors must be awaited sequentially
//! on it.

use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, Row};
use tracing::Instrument;

/// Trait for session handles that can run read-only queries.
///
/// Implemented for `tokio_postgres::Client` and `deadpool_postgres::Object`.
pub trait Session: Send + Sync {
    /// Run a query, returning all rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Row>, Error>> + Send + 'a>>;

    /// Run a query, returning exactly one row.
    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Row, Error>> + Send + 'a>>;

    /// Run a query, returning at most one row.
    fn query_opt<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Row>, Error>> + Send + 'a>>;
}

impl Session for tokio_postgres::Client {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Row>, Error>> + Send + 'a>>
    {
        Box::pin(tokio_postgres::Client::query(self, sql, params))
    }

    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Row, Error>> + Send + 'a>> {
        Box::pin(tokio_postgres::Client::query_one(self, sql, params))
    }

    fn query_opt<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Row>, Error>> + Send + 'a>>
    {
        Box::pin(tokio_postgres::Client::query_opt(self, sql, params))
    }
}

impl Session for deadpool_postgres::Object {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Row>, Error>> + Send + 'a>>
    {
        // Coerce down to the underlying Client to avoid recursing into this impl.
        let client: &tokio_postgres::Client = self;
        Box::pin(client.query(sql, params))
    }

    fn query_one<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Row, Error>> + Send + 'a>> {
        let client: &tokio_postgres::Client = self;
        Box::pin(client.query_one(sql, params))
    }

    fn query_opt<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Option<Row>, Error>> + Send + 'a>>
    {
        let client: &tokio_postgres::Client = self;
        Box::pin(client.query_opt(sql, params))
    }
}

/// A session wrapper that logs every query via tracing.
///
/// # Example
///
/// ```ignore
/// use squill::SessionExt;
///
/// let rows = client
///     .traced()
///     .query("SELECT setting FROM pg_settings WHERE name = $1", &[&name])
///     .await?;
/// ```
pub struct TracedSession<'a, S: Session> {
    session: &'a S,
}

impl<'a, S: Session> TracedSession<'a, S> {
    /// Wrap a session.
    pub fn new(session: &'a S) -> Self {
        Self { session }
    }

    /// Run a query, returning all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let span = tracing::debug_span!(
            "catalog.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let rows = self
            .session
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Run a query, returning exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, Error> {
        let span = tracing::debug_span!(
            "catalog.query",
            sql = %sql,
            params = params.len(),
            rows = 1u64,
        );
        self.session.query_one(sql, params).instrument(span).await
    }

    /// Run a query, returning at most one row.
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        let span = tracing::debug_span!(
            "catalog.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let row = self
            .session
            .query_opt(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", if row.is_some() { 1u64 } else { 0u64 });
        Ok(row)
    }
}

/// Extension trait to get a traced wrapper from a session.
pub trait SessionExt: Session + Sized {
    /// Wrap this session in a [`TracedSession`] for query logging.
    fn traced(&self) -> TracedSession<'_, Self> {
        TracedSession::new(self)
    }
}

impl<S: Session> SessionExt for S {}

/// A cloneable handle over a `deadpool_postgres::Pool`.
///
/// Objects checked out of it implement [`Session`], so they plug straight
/// into the catalog reader.
#[derive(Clone)]
pub struct SessionPool {
    inner: deadpool_postgres::Pool,
}

impl SessionPool {
    /// Wrap an existing pool.
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { inner: pool }
    }

    /// Check a session out of the pool.
    pub async fn get(&self) -> Result<deadpool_postgres::Object, deadpool_postgres::PoolError> {
        self.inner.get().await
    }

    /// Access the underlying pool.
    pub fn inner(&self) -> &deadpool_postgres::Pool {
        &self.inner
    }
}
