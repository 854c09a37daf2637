//! Driver abstraction.
//!
//! The pool never speaks a wire protocol itself. A [`Driver`] opens
//! [`Session`]s; a session runs statements and opens [`Cursor`]s over
//! result sets. Backends such as `unitpool-mysql` implement these traits,
//! and the same traits let the pool be exercised without a network.
//!
//! The traits use `#[async_trait]` so that pools can hold drivers and
//! sessions as trait objects.

use std::borrow::Cow;
use std::fmt;

use crate::config::ConnectOptions;
use crate::error::DriverError;
use crate::value::{Row, Value};

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    /// Number of rows changed by the statement.
    pub rows_affected: u64,
    /// Identifier generated for an inserted row, if any.
    pub last_insert_id: Option<u64>,
}

impl ExecuteResult {
    /// Create a result for `rows_affected` rows without a generated id.
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }

    /// Attach a generated row identifier.
    #[must_use]
    pub fn with_last_insert_id(mut self, id: u64) -> Self {
        self.last_insert_id = Some(id);
        self
    }
}

/// Factory for database sessions.
#[async_trait::async_trait]
pub trait Driver: Send + Sync + fmt::Debug + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Native positional placeholder for the parameter at `index` (1-based).
    ///
    /// Statements are written with `?`; each `?` is replaced with the text
    /// returned here before it reaches the session.
    fn placeholder(&self, index: usize) -> Cow<'static, str> {
        let _ = index;
        Cow::Borrowed("?")
    }

    /// Open a new session.
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Session>, DriverError>;
}

/// One live database session.
///
/// Dropping a session without [`Session::close`] must still release its
/// socket.
#[async_trait::async_trait]
pub trait Session: Send + 'static {
    /// Check the session is alive; with `reconnect`, re-establish it if not.
    async fn ping(&mut self, reconnect: bool) -> Result<(), DriverError>;

    /// Run a statement that does not return rows.
    async fn execute(&mut self, sql: &str, params: Vec<Value>)
    -> Result<ExecuteResult, DriverError>;

    /// Run a query and open a forward-only cursor over its rows.
    async fn cursor<'s>(
        &'s mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Box<dyn Cursor + 's>, DriverError>;

    /// Start an explicit transaction.
    async fn begin(&mut self) -> Result<(), DriverError>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Drop any pending result state before the session is reused.
    fn discard_results(&mut self) {}

    /// Terminate the session.
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Forward-only cursor over a result set.
///
/// Dropping a cursor releases the server-side result, whether or not it
/// was read to the end.
#[async_trait::async_trait]
pub trait Cursor: Send {
    /// Fetch up to `max` rows.
    ///
    /// A batch shorter than `max` (or empty) means the result is exhausted.
    async fn fetch(&mut self, max: usize) -> Result<Vec<Row>, DriverError>;
}
