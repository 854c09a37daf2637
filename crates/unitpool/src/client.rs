//! Connection-scoped clients.
//!
//! A [`Conn`] holds one pooled [`Connection`] for its whole lifetime and
//! commits every statement as it runs. [`Trans`](crate::Trans) holds one
//! inside an explicit transaction. Both release their connection on
//! [`Conn::close`] or, failing that, when dropped.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::try_stream;
use futures_core::Stream;

use crate::connection::Connection;
use crate::driver::{ExecuteResult, Session};
use crate::error::{DriverError, Error, Result};
use crate::pool::Pool;
use crate::registry::Registry;
use crate::sql::substitute_placeholders;
use crate::value::{Row, Value};

/// Default batch size for [`Queryable::query_range`].
pub const DEFAULT_BATCH_SIZE: usize = 100;

const FETCH_ALL_BATCH: usize = 256;

/// The connection held by a client and what happened to it.
///
/// Dropping a unit of work releases its connection: a clean one goes
/// straight back to its pool, one with an open transaction or a
/// non-reusable failure is finished on a spawned task.
#[derive(Debug)]
pub struct UnitOfWork {
    connection: Option<Connection>,
    pool_name: String,
    failure: Option<DriverError>,
    in_transaction: bool,
}

impl UnitOfWork {
    pub(crate) async fn acquire(pool: &Pool) -> Result<Self> {
        let connection = pool.get().await?;
        Ok(Self {
            connection: Some(connection),
            pool_name: pool.name().to_string(),
            failure: None,
            in_transaction: false,
        })
    }

    pub(crate) fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub(crate) fn connection_id(&self) -> Option<u64> {
        self.connection.as_ref().map(Connection::id)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    pub(crate) fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub(crate) fn session(&mut self) -> Result<&mut dyn Session> {
        let session: &mut dyn Session = live(self.connection()?)?;
        Ok(session)
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(Error::Closed)
    }

    pub(crate) async fn execute(&mut self, sql: &str, params: Vec<Value>) -> Result<ExecuteResult> {
        let conn = self.connection.as_mut().ok_or(Error::Closed)?;
        let driver = Arc::clone(conn.driver());
        let sql = substitute_placeholders(driver.as_ref(), sql);
        tracing::debug!(pool = %self.pool_name, sql = %sql, "executing statement");
        let result = live(conn)?.execute(&sql, params).await;
        result.map_err(|e| record_failure(&mut self.failure, e))
    }

    async fn fetch(&mut self, sql: &str, params: Vec<Value>, limit: Option<usize>) -> Result<Vec<Row>> {
        let conn = self.connection.as_mut().ok_or(Error::Closed)?;
        let driver = Arc::clone(conn.driver());
        let sql = substitute_placeholders(driver.as_ref(), sql);
        tracing::debug!(pool = %self.pool_name, sql = %sql, "running query");
        let result = collect_rows(live(conn)?, &sql, params, limit).await;
        result.map_err(|e| record_failure(&mut self.failure, e))
    }

    fn query_range<'a>(&'a mut self, sql: &'a str, params: Vec<Value>, batch_size: usize) -> RowRange<'a> {
        let Self {
            connection,
            failure,
            ..
        } = self;
        RowRange {
            inner: Box::pin(row_stream(connection, failure, sql, params, batch_size.max(1))),
        }
    }

    pub(crate) async fn begin(&mut self) -> Result<()> {
        let result = live(self.connection()?)?.begin().await;
        result.map_err(|e| record_failure(&mut self.failure, e))?;
        self.in_transaction = true;
        Ok(())
    }

    pub(crate) async fn commit(&mut self) -> Result<()> {
        let result = live(self.connection()?)?.commit().await;
        result.map_err(|e| record_failure(&mut self.failure, e))?;
        self.in_transaction = false;
        Ok(())
    }

    pub(crate) async fn rollback(&mut self) -> Result<()> {
        let result = live(self.connection()?)?.rollback().await;
        result.map_err(|e| record_failure(&mut self.failure, e))?;
        self.in_transaction = false;
        Ok(())
    }

    /// Release the connection. Closing twice is a no-op.
    ///
    /// An open transaction is rolled back while the connection is still
    /// held here, so cancelling the rollback leaves it to [`Drop`].
    pub(crate) async fn close(&mut self) {
        if self.in_transaction && self.failure.is_none() {
            if let Some(connection) = self.connection.as_mut() {
                self.failure = rollback_open(connection, &self.pool_name).await.err();
            }
        }
        if let Some(connection) = self.connection.take() {
            self.in_transaction = false;
            connection.release(self.failure.take().as_ref()).await;
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        tracing::debug!(
            pool = %self.pool_name,
            connection_id = connection.id(),
            "client dropped without close, releasing connection"
        );

        if self.failure.is_none() && !self.in_transaction {
            // A dropped pooled connection goes back into its pool.
            drop(connection);
            return;
        }

        let failure = self.failure.take();
        let in_transaction = self.in_transaction;
        let pool_name = std::mem::take(&mut self.pool_name);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                finish(connection, failure, in_transaction, &pool_name).await;
            });
        } else {
            tracing::warn!(
                pool = %pool_name,
                connection_id = connection.id(),
                "tokio runtime unavailable, dropping connection without release"
            );
            let mut connection = connection;
            connection.detach();
        }
    }
}

fn live(conn: &mut Connection) -> Result<&mut (dyn Session + 'static)> {
    conn.session().ok_or(Error::Closed)
}

/// Remember a failure that leaves the session suspect and wrap it.
fn record_failure(slot: &mut Option<DriverError>, err: DriverError) -> Error {
    if !err.is_reusable() {
        *slot = Some(err.clone());
    }
    Error::Statement(err)
}

async fn finish(
    mut connection: Connection,
    mut failure: Option<DriverError>,
    in_transaction: bool,
    pool_name: &str,
) {
    // A suspect session is terminated on release, which ends its transaction.
    if in_transaction && failure.is_none() {
        failure = rollback_open(&mut connection, pool_name).await.err();
    }
    connection.release(failure.as_ref()).await;
}

async fn rollback_open(
    connection: &mut Connection,
    pool_name: &str,
) -> std::result::Result<(), DriverError> {
    tracing::warn!(
        pool = %pool_name,
        connection_id = connection.id(),
        "transaction still open at close, rolling back"
    );
    let Some(session) = connection.session() else {
        return Ok(());
    };
    let result = session.rollback().await;
    if let Err(e) = &result {
        tracing::warn!(
            pool = %pool_name,
            connection_id = connection.id(),
            error = %e,
            "rollback at close failed"
        );
    }
    result
}

async fn collect_rows(
    session: &mut dyn Session,
    sql: &str,
    params: Vec<Value>,
    limit: Option<usize>,
) -> std::result::Result<Vec<Row>, DriverError> {
    let mut cursor = session.cursor(sql, params).await?;
    if let Some(limit) = limit {
        let rows = cursor.fetch(limit).await?;
        return Ok(rows.into_iter().take(limit).map(Row::encoded).collect());
    }

    let mut rows = Vec::new();
    loop {
        let batch = cursor.fetch(FETCH_ALL_BATCH).await?;
        let done = batch.len() < FETCH_ALL_BATCH;
        rows.extend(batch.into_iter().map(Row::encoded));
        if done {
            return Ok(rows);
        }
    }
}

fn row_stream<'a>(
    connection: &'a mut Option<Connection>,
    failure: &'a mut Option<DriverError>,
    sql: &'a str,
    params: Vec<Value>,
    batch_size: usize,
) -> impl Stream<Item = Result<Row>> + Send + 'a {
    try_stream! {
        let conn = connection.as_mut().ok_or(Error::Closed)?;
        let driver = Arc::clone(conn.driver());
        let sql = substitute_placeholders(driver.as_ref(), sql);
        tracing::debug!(sql = %sql, batch_size, "opening range query");

        let mut cursor = live(conn)?
            .cursor(&sql, params)
            .await
            .map_err(|e| record_failure(failure, e))?;
        loop {
            let batch = cursor
                .fetch(batch_size)
                .await
                .map_err(|e| record_failure(failure, e))?;
            let done = batch.len() < batch_size;
            for row in batch {
                yield row.encoded();
            }
            if done {
                break;
            }
        }
    }
}

/// Lazy, forward-only sequence of rows fetched in batches.
///
/// The server-side cursor is opened on the first pull and closed when the
/// range is exhausted or dropped, whichever happens first.
pub struct RowRange<'a> {
    inner: Pin<Box<dyn Stream<Item = Result<Row>> + Send + 'a>>,
}

impl RowRange<'_> {
    /// Pull the next row, or `None` once the result is exhausted.
    pub async fn next(&mut self) -> Option<Result<Row>> {
        std::future::poll_fn(|cx| self.inner.as_mut().poll_next(cx)).await
    }
}

impl Stream for RowRange<'_> {
    type Item = Result<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for RowRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowRange").finish_non_exhaustive()
    }
}

pub(crate) mod sealed {
    /// Access to the unit of work behind a client.
    pub trait Sealed {
        /// The client's unit of work.
        fn unit(&mut self) -> &mut super::UnitOfWork;
    }
}

/// Read operations shared by [`Conn`] and [`Trans`](crate::Trans).
///
/// Statements use `?` for positional parameters. Every returned row has
/// decimals converted to floats and datetimes to `YYYY-MM-DD HH:MM:SS`
/// text (see [`Value::encoded`]).
#[async_trait::async_trait]
pub trait Queryable: sealed::Sealed + Send {
    /// Fetch the first row, or `None` if the query matched nothing.
    async fn query_one(&mut self, sql: &str, params: Vec<Value>) -> Result<Option<Row>> {
        let rows = self.unit().fetch(sql, params, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Fetch every row. No match gives an empty vector.
    async fn query(&mut self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        self.unit().fetch(sql, params, None).await
    }

    /// Stream rows, fetching `batch_size` at a time.
    ///
    /// The range ends after an empty batch or one shorter than
    /// `batch_size`. A `batch_size` of zero is treated as one.
    fn query_range<'a>(
        &'a mut self,
        sql: &'a str,
        params: Vec<Value>,
        batch_size: usize,
    ) -> RowRange<'a> {
        self.unit().query_range(sql, params, batch_size)
    }
}

/// Auto-committing client bound to one pooled connection.
///
/// # Example
///
/// ```rust,ignore
/// use unitpool::{Conn, Queryable, params};
///
/// let mut conn = Conn::open(&registry, "orders").await?;
/// let id = conn
///     .insert("INSERT INTO orders (customer, total) VALUES (?, ?)", params!["acme", 12.5])
///     .await?;
/// let row = conn.query_one("SELECT * FROM orders WHERE id = ?", params![id]).await?;
/// conn.close().await;
/// ```
#[derive(Debug)]
pub struct Conn {
    unit: UnitOfWork,
}

impl Conn {
    /// Take a connection from the pool registered as `name`.
    ///
    /// Fails with [`Error::PoolNotFound`] or [`Error::PoolExhausted`].
    pub async fn open(registry: &Registry, name: &str) -> Result<Self> {
        let pool = registry.lookup(name)?;
        Self::from_pool(&pool).await
    }

    /// Take a connection from `pool` using its default timeout and retries.
    pub async fn from_pool(pool: &Pool) -> Result<Self> {
        Ok(Self {
            unit: UnitOfWork::acquire(pool).await?,
        })
    }

    /// Run a statement and commit it. Returns the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: Vec<Value>) -> Result<u64> {
        let result = self.unit.execute(sql, params).await?;
        self.unit.commit().await?;
        Ok(result.rows_affected)
    }

    /// Run an insert and commit it. Returns the generated row id, or 0 if
    /// the statement generated none.
    pub async fn insert(&mut self, sql: &str, params: Vec<Value>) -> Result<u64> {
        let result = self.unit.execute(sql, params).await?;
        self.unit.commit().await?;
        Ok(result.last_insert_id.unwrap_or(0))
    }

    /// Release the connection.
    ///
    /// The connection goes back to its pool, or is replaced there if a
    /// statement failed in a way that leaves the session suspect.
    pub async fn close(&mut self) {
        self.unit.close().await;
    }

    /// Underlying driver session.
    pub fn session(&mut self) -> Result<&mut dyn Session> {
        self.unit.session()
    }

    /// Name of the pool the connection came from.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        self.unit.pool_name()
    }

    /// Identifier of the held connection; `None` after close.
    #[must_use]
    pub fn connection_id(&self) -> Option<u64> {
        self.unit.connection_id()
    }

    /// Check if the connection has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.unit.is_closed()
    }
}

impl sealed::Sealed for Conn {
    fn unit(&mut self) -> &mut UnitOfWork {
        &mut self.unit
    }
}

impl Queryable for Conn {}
