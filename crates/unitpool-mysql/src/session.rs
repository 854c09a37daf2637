//! MySQL sessions and cursors.

use std::sync::Arc;

use mysql_async::prelude::{Protocol, Queryable as _};
use mysql_async::{Column, Conn, Opts, Params, QueryResult, Value as MySqlValue};
use unitpool::{Cursor, DriverError, ExecuteResult, Row, Session, Value};

use crate::error::classify;
use crate::value::{from_mysql, to_mysql};

/// A live MySQL session.
///
/// Dropping the session drops the underlying `mysql_async::Conn`, which
/// closes its socket.
pub struct MySqlSession {
    conn: Conn,
    opts: Opts,
}

impl MySqlSession {
    pub(crate) fn new(conn: Conn, opts: Opts) -> Self {
        Self { conn, opts }
    }

    /// Server-side connection id.
    #[must_use]
    pub fn connection_id(&self) -> u32 {
        self.conn.id()
    }

    async fn reconnect(&mut self) -> Result<(), DriverError> {
        let fresh = Conn::new(self.opts.clone()).await.map_err(classify)?;
        let stale = std::mem::replace(&mut self.conn, fresh);
        tracing::debug!(
            old_id = stale.id(),
            new_id = self.conn.id(),
            "MySQL session reconnected"
        );
        drop(stale);
        Ok(())
    }
}

impl std::fmt::Debug for MySqlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSession")
            .field("connection_id", &self.conn.id())
            .finish_non_exhaustive()
    }
}

fn positional(params: Vec<Value>) -> Params {
    Params::Positional(params.into_iter().map(to_mysql).collect())
}

#[async_trait::async_trait]
impl Session for MySqlSession {
    async fn ping(&mut self, reconnect: bool) -> Result<(), DriverError> {
        match self.conn.ping().await {
            Ok(()) => Ok(()),
            Err(err) if reconnect => {
                tracing::debug!(error = %err, "MySQL ping failed, reconnecting");
                self.reconnect().await
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<ExecuteResult, DriverError> {
        let outcome = if params.is_empty() {
            self.conn.query_drop(sql).await
        } else {
            self.conn.exec_drop(sql, positional(params)).await
        };
        outcome.map_err(classify)?;

        let result = ExecuteResult::affected(self.conn.affected_rows());
        Ok(match self.conn.last_insert_id() {
            Some(id) if id != 0 => result.with_last_insert_id(id),
            _ => result,
        })
    }

    async fn cursor<'s>(
        &'s mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Box<dyn Cursor + 's>, DriverError> {
        let sql = sql.to_owned();
        if params.is_empty() {
            let result = self.conn.query_iter(sql).await.map_err(classify)?;
            Ok(Box::new(MySqlCursor::new(result)))
        } else {
            let result = self
                .conn
                .exec_iter(sql, positional(params))
                .await
                .map_err(classify)?;
            Ok(Box::new(MySqlCursor::new(result)))
        }
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.conn
            .query_drop("START TRANSACTION")
            .await
            .map_err(classify)
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.conn.query_drop("COMMIT").await.map_err(classify)
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.conn.query_drop("ROLLBACK").await.map_err(classify)
    }

    // An unread result set is drained by mysql_async before the next command.
    fn discard_results(&mut self) {}

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.conn.disconnect().await.map_err(classify)
    }
}

/// Cursor over the first result set of a query.
struct MySqlCursor<'a, P: Protocol> {
    result: QueryResult<'a, 'static, P>,
    names: Option<Arc<[String]>>,
}

impl<'a, P: Protocol> MySqlCursor<'a, P> {
    fn new(result: QueryResult<'a, 'static, P>) -> Self {
        Self {
            result,
            names: None,
        }
    }

    fn convert(&mut self, mut row: mysql_async::Row) -> Row {
        let columns: Arc<[Column]> = row.columns();
        let names = self
            .names
            .get_or_insert_with(|| {
                columns
                    .iter()
                    .map(|column| column.name_str().into_owned())
                    .collect()
            })
            .clone();
        let values = columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let raw = row.take::<MySqlValue, usize>(index).unwrap_or(MySqlValue::NULL);
                from_mysql(raw, column)
            })
            .collect();
        Row::new(names, values)
    }
}

#[async_trait::async_trait]
impl<P: Protocol> Cursor for MySqlCursor<'_, P> {
    async fn fetch(&mut self, max: usize) -> Result<Vec<Row>, DriverError> {
        let mut rows = Vec::with_capacity(max.min(256));
        while rows.len() < max {
            match self.result.next().await.map_err(classify)? {
                Some(row) => {
                    let row = self.convert(row);
                    rows.push(row);
                }
                None => break,
            }
        }
        Ok(rows)
    }
}
