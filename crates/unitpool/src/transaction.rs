//! Explicit transaction client.

use crate::client::{Queryable, UnitOfWork, sealed};
use crate::driver::Session;
use crate::error::Result;
use crate::pool::Pool;
use crate::registry::Registry;
use crate::value::Value;

/// Client that holds one pooled connection inside an explicit transaction.
///
/// The transaction begins when the client is opened. Statements are not
/// committed until [`Trans::commit`]; [`Trans::close`] must still be called
/// afterwards to release the connection. Closing or dropping the client
/// with the transaction still open rolls it back.
///
/// # Example
///
/// ```rust,ignore
/// use unitpool::{Trans, params};
///
/// let mut tx = Trans::open(&registry, "bank").await?;
/// let debited = tx.execute("UPDATE account SET balance = balance - ? WHERE id = ?", params![100, 1]).await;
/// let credited = tx.execute("UPDATE account SET balance = balance + ? WHERE id = ?", params![100, 2]).await;
/// if debited.is_some() && credited.is_some() {
///     tx.commit().await?;
/// } else {
///     tx.rollback().await?;
/// }
/// tx.close().await;
/// ```
#[derive(Debug)]
pub struct Trans {
    unit: UnitOfWork,
}

impl Trans {
    /// Take a connection from the pool registered as `name` and begin a
    /// transaction on it.
    pub async fn open(registry: &Registry, name: &str) -> Result<Self> {
        let pool = registry.lookup(name)?;
        Self::from_pool(&pool).await
    }

    /// Take a connection from `pool` and begin a transaction on it.
    pub async fn from_pool(pool: &Pool) -> Result<Self> {
        let mut unit = UnitOfWork::acquire(pool).await?;
        unit.begin().await?;
        Ok(Self { unit })
    }

    /// Run a statement inside the transaction.
    ///
    /// Returns the number of affected rows, or `None` if the statement
    /// failed. The failure is logged and not propagated; check the result
    /// before deciding to commit.
    #[must_use = "a failed statement is only reported through the returned Option"]
    pub async fn execute(&mut self, sql: &str, params: Vec<Value>) -> Option<u64> {
        match self.unit.execute(sql, params).await {
            Ok(result) => Some(result.rows_affected),
            Err(e) => {
                tracing::warn!(
                    pool = %self.unit.pool_name(),
                    sql = %sql,
                    error = %e,
                    "statement failed inside transaction"
                );
                None
            }
        }
    }

    /// Run an insert inside the transaction. Returns the generated row id,
    /// or 0 if the statement generated none.
    pub async fn insert(&mut self, sql: &str, params: Vec<Value>) -> Result<u64> {
        let result = self.unit.execute(sql, params).await?;
        Ok(result.last_insert_id.unwrap_or(0))
    }

    /// Commit the transaction.
    pub async fn commit(&mut self) -> Result<()> {
        self.unit.commit().await
    }

    /// Roll back the transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.unit.rollback().await
    }

    /// Release the connection, rolling back a transaction left open.
    pub async fn close(&mut self) {
        self.unit.close().await;
    }

    /// Check if the transaction has not been committed or rolled back yet.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.unit.in_transaction()
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

impl sealed::Sealed for Trans {
    fn unit(&mut self) -> &mut UnitOfWork {
        &mut self.unit
    }
}

impl Queryable for Trans {}
