//! Pool-aware database connection.
//!
//! A [`Connection`] wraps one driver [`Session`] and remembers the pool that
//! owns it. Closing an owned connection returns it to that pool instead of
//! terminating the session, and so does dropping it.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::config::ConnectOptions;
use crate::driver::{Driver, Session};
use crate::error::{DriverError, ErrorKind};
use crate::lifecycle::{ConnectionMetadata, next_connection_id};
use crate::pool::{Pool, PoolInner};

/// Everything needed to open an equivalent session again.
#[derive(Debug)]
pub(crate) struct ConnectionFactory {
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) options: ConnectOptions,
}

impl ConnectionFactory {
    pub(crate) fn new(driver: Arc<dyn Driver>, options: ConnectOptions) -> Self {
        Self { driver, options }
    }

    pub(crate) async fn open(
        self: &Arc<Self>,
        owner: Option<Weak<PoolInner>>,
    ) -> Result<Connection, DriverError> {
        let session = self.driver.connect(&self.options).await?;
        let meta = ConnectionMetadata::new(next_connection_id());
        tracing::debug!(
            driver = self.driver.name(),
            host = %self.options.host,
            connection_id = meta.id,
            "opened database session"
        );
        Ok(Connection {
            session: Some(session),
            meta,
            owner,
            factory: Arc::clone(self),
        })
    }
}

/// A single database session, optionally owned by a [`Pool`].
///
/// A connection is moved, never shared: it is either idle inside one pool
/// or held by exactly one consumer.
///
/// Dropping a connection that a live pool owns puts it back into that pool,
/// so an early return or a cancelled future never leaks it.
pub struct Connection {
    pub(crate) session: Option<Box<dyn Session>>,
    pub(crate) meta: ConnectionMetadata,
    pub(crate) owner: Option<Weak<PoolInner>>,
    factory: Arc<ConnectionFactory>,
}

impl Connection {
    /// Open a connection that no pool owns.
    ///
    /// Putting it into a pool with [`Pool::put_connection`] makes that pool
    /// its owner.
    pub async fn connect(
        driver: Arc<dyn Driver>,
        options: ConnectOptions,
    ) -> Result<Self, DriverError> {
        Arc::new(ConnectionFactory::new(driver, options))
            .open(None)
            .await
    }

    /// Unique identifier of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    /// Lifecycle metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.meta
    }

    /// Driver that opened this connection.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.factory.driver
    }

    /// Options this connection was opened with.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.factory.options
    }

    /// Underlying driver session, `None` once it has been terminated.
    pub fn session(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut()
    }

    /// Forget the owning pool so that dropping the connection closes it.
    pub(crate) fn detach(&mut self) {
        self.owner = None;
    }

    /// Pool that owns this connection, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<Pool> {
        self.owner
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Pool::from_inner)
    }

    /// Check if a pool owns this connection.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.owner().is_some()
    }

    /// Re-validate the session if it has been idle longer than `stale_after`.
    ///
    /// A stale session is pinged with reconnect enabled; on success its
    /// last-use time is reset. Fresh sessions are left alone.
    pub async fn ping(&mut self, stale_after: Duration) -> Result<(), DriverError> {
        if !self.meta.is_stale(stale_after) {
            return Ok(());
        }
        tracing::debug!(
            connection_id = self.meta.id,
            idle = ?self.meta.idle_for(),
            "pinging stale connection"
        );
        let session = self
            .session
            .as_deref_mut()
            .ok_or_else(|| DriverError::new(ErrorKind::Interface, "session already closed"))?;
        session.ping(true).await?;
        self.meta.mark_used();
        Ok(())
    }

    /// Hand the connection back after use.
    ///
    /// With no failure, or a failure that leaves the session intact, the
    /// connection returns to its pool. Any other failure makes the session
    /// suspect: a fresh connection with the same options goes into the pool
    /// instead and this session is terminated.
    ///
    /// The replacement is opened on its own task, so it still reaches the
    /// pool if this future is cancelled.
    pub async fn release(mut self, failure: Option<&DriverError>) {
        let cause = match failure {
            Some(cause) if !cause.is_reusable() => cause.clone(),
            _ => return self.close().await,
        };

        let Some(pool) = self.owner() else {
            self.terminate().await;
            return;
        };
        self.detach();

        let factory = Arc::clone(&self.factory);
        let id = self.meta.id;
        let replacing = tokio::spawn(async move {
            match factory.open(Some(pool.downgrade())).await {
                Ok(fresh) => {
                    pool.inner.created.fetch_add(1, Ordering::Relaxed);
                    pool.inner.replaced.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        pool = %pool.name(),
                        connection_id = id,
                        replacement_id = fresh.meta.id,
                        cause = %cause,
                        "replacing connection after non-reusable error"
                    );
                    pool.put_connection(fresh);
                }
                Err(e) => {
                    tracing::error!(
                        pool = %pool.name(),
                        connection_id = id,
                        cause = %cause,
                        error = %e,
                        "failed to create replacement connection"
                    );
                }
            }
        });

        self.terminate().await;
        if let Err(e) = replacing.await {
            tracing::error!(connection_id = id, error = %e, "replacement task failed");
        }
    }

    /// Close the connection.
    ///
    /// An owned connection is recycled into its pool; the session stays
    /// open. An unowned connection terminates its session.
    pub async fn close(self) {
        if let Some(orphan) = self.recycle() {
            orphan.terminate().await;
        }
    }

    /// Put an owned connection back into its pool; hands it back if no
    /// live pool owns it.
    pub(crate) fn recycle(self) -> Option<Self> {
        match self.owner() {
            Some(pool) => {
                pool.put_connection(self);
                None
            }
            None => Some(self),
        }
    }

    pub(crate) async fn terminate(mut self) {
        self.detach();
        let id = self.meta.id;
        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.close().await {
            tracing::debug!(connection_id = id, error = %e, "error closing session");
        } else {
            tracing::debug!(connection_id = id, "closed database session");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(pool) = self.owner.take().and_then(|owner| owner.upgrade()) else {
            return;
        };
        let pool = Pool::from_inner(pool);
        tracing::debug!(
            pool = %pool.name(),
            connection_id = self.meta.id,
            "connection dropped while checked out, returning it to the pool"
        );
        pool.put_connection(Connection {
            session: Some(session),
            meta: self.meta.clone(),
            owner: None,
            factory: Arc::clone(&self.factory),
        });
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.meta.id)
            .field("driver", &self.factory.driver.name())
            .field("host", &self.factory.options.host)
            .field("pooled", &self.is_pooled())
            .finish()
    }
}
