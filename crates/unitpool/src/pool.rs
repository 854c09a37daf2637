//! Connection pool implementation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use flume::{Receiver, Sender, TrySendError};

use crate::config::{MAX_POOL_SIZE, MIN_POOL_SIZE, PoolConfig};
use crate::connection::{Connection, ConnectionFactory};
use crate::driver::Driver;
use crate::error::{DriverError, Error, ErrorKind, Result};

/// A bounded pool of database connections for one target.
///
/// The pool pre-creates its connections and keeps idle ones in a bounded
/// channel. Acquisition waits on the channel with a timeout and retries a
/// fixed number of times; release never blocks, and a connection released
/// into a full pool is closed.
///
/// Cloning a `Pool` is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct Pool {
    pub(crate) inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    name: String,
    config: PoolConfig,
    size: usize,
    factory: Arc<ConnectionFactory>,
    sender: Sender<Connection>,
    receiver: Receiver<Connection>,
    pub(crate) created: AtomicU64,
    pub(crate) replaced: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

impl Pool {
    /// Create a pool and open its connections.
    ///
    /// The requested size is clamped into `[MIN_POOL_SIZE, MAX_POOL_SIZE]`.
    /// Fails with [`Error::Configuration`] for an invalid configuration and
    /// [`Error::Connect`] if any initial connection cannot be opened.
    pub async fn new(driver: Arc<dyn Driver>, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let size = config.effective_size();
        let name = config.effective_name();
        if size != config.size {
            tracing::warn!(
                pool = %name,
                requested = config.size,
                size,
                "pool size out of range [{MIN_POOL_SIZE}, {MAX_POOL_SIZE}], clamped"
            );
        }

        let (sender, receiver) = flume::bounded(config.capacity);
        let factory = Arc::new(ConnectionFactory::new(driver, config.connect.clone()));
        let pool = Self {
            inner: Arc::new(PoolInner {
                name,
                config,
                size,
                factory,
                sender,
                receiver,
                created: AtomicU64::new(0),
                replaced: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        };

        for _ in 0..size {
            let conn = pool.open_connection().await?;
            pool.put_connection(conn);
        }

        tracing::debug!(
            pool = %pool.inner.name,
            driver = pool.inner.factory.driver.name(),
            size,
            capacity = pool.inner.config.capacity,
            "connection pool created"
        );
        Ok(pool)
    }

    pub(crate) fn from_inner(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<PoolInner> {
        Arc::downgrade(&self.inner)
    }

    async fn open_connection(&self) -> Result<Connection> {
        let conn = self
            .inner
            .factory
            .open(Some(self.downgrade()))
            .await
            .map_err(|source| Error::Connect {
                pool: self.inner.name.clone(),
                source,
            })?;
        self.inner.created.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    /// Take a connection using the configured timeout and retry count.
    pub async fn get(&self) -> Result<Connection> {
        self.get_connection(self.inner.config.acquire_timeout, self.inner.config.retry_count)
            .await
    }

    /// Take a connection from the pool.
    ///
    /// Each attempt waits up to `timeout` for an idle connection; a zero
    /// timeout only checks for one that is already idle. After the first
    /// attempt up to `retry_count` more are made before failing with
    /// [`Error::PoolExhausted`].
    ///
    /// The connection is pinged if it has been idle past the staleness
    /// threshold. If the ping fails it is replaced by a new connection.
    pub async fn get_connection(&self, timeout: Duration, retry_count: u32) -> Result<Connection> {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            if let Some(conn) = self.take(timeout).await {
                tracing::debug!(
                    pool = %self.inner.name,
                    connection_id = conn.id(),
                    attempts,
                    "acquired connection"
                );
                return self.checkout(conn).await;
            }
            if attempts > retry_count {
                tracing::debug!(pool = %self.inner.name, attempts, "pool exhausted");
                return Err(Error::PoolExhausted {
                    pool: self.inner.name.clone(),
                    timeout,
                    attempts,
                });
            }
            tracing::debug!(
                pool = %self.inner.name,
                attempt = attempts,
                retry_count,
                "no idle connection, retrying"
            );
        }
    }

    async fn take(&self, timeout: Duration) -> Option<Connection> {
        if timeout.is_zero() {
            return self.inner.receiver.try_recv().ok();
        }
        match tokio::time::timeout(timeout, self.inner.receiver.recv_async()).await {
            Ok(Ok(conn)) => Some(conn),
            _ => None,
        }
    }

    async fn checkout(&self, mut conn: Connection) -> Result<Connection> {
        conn.meta.mark_checkout();
        let cause = match conn.ping(self.inner.config.stale_after).await {
            Ok(()) => return Ok(conn),
            Err(cause) => cause,
        };

        tracing::warn!(
            pool = %self.inner.name,
            connection_id = conn.id(),
            error = %cause,
            "ping failed, replacing connection"
        );
        conn.terminate().await;

        let mut fresh = self.open_replacement().await?;
        fresh.meta.mark_checkout();
        Ok(fresh)
    }

    /// Open a connection on its own task. If the caller is cancelled the
    /// finished connection is dropped, which puts it into the pool.
    async fn open_replacement(&self) -> Result<Connection> {
        let pool = self.clone();
        let opening = tokio::spawn(async move {
            let conn = pool.open_connection().await?;
            pool.inner.replaced.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Error>(conn)
        });
        match opening.await {
            Ok(result) => result,
            Err(e) => Err(Error::Connect {
                pool: self.inner.name.clone(),
                source: DriverError::new(ErrorKind::Internal, e.to_string()),
            }),
        }
    }

    /// Put a connection into the idle store.
    ///
    /// A connection without an owner is adopted by this pool. Pending
    /// results are discarded first. If the store is full the connection is
    /// detached and its session closed.
    pub fn put_connection(&self, mut conn: Connection) {
        let Some(session) = conn.session() else {
            return;
        };
        session.discard_results();
        if conn.owner.is_none() {
            conn.owner = Some(self.downgrade());
        }

        let id = conn.id();
        match self.inner.sender.try_send(conn) {
            Ok(()) => {
                tracing::debug!(pool = %self.inner.name, connection_id = id, "released connection");
            }
            Err(TrySendError::Full(mut conn) | TrySendError::Disconnected(mut conn)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    pool = %self.inner.name,
                    connection_id = id,
                    capacity = self.inner.config.capacity,
                    "pool is full, dropping connection"
                );
                conn.detach();
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(conn.terminate());
                    }
                    // Dropping a detached connection closes the socket.
                    Err(_) => drop(conn),
                }
            }
        }
    }

    /// Number of idle connections.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.receiver.len()
    }

    /// Registry key of this pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Configuration the pool was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Driver used to open connections.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.inner.factory.driver
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            idle: self.size(),
            size: self.inner.size,
            capacity: self.inner.config.capacity,
            created: self.inner.created.load(Ordering::Relaxed),
            replaced: self.inner.replaced.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    /// Check if two handles refer to the same pool.
    #[must_use]
    pub fn same_pool(&self, other: &Pool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub idle: usize,
    /// Number of connections created up front (the clamped size).
    pub size: usize,
    /// Maximum number of idle connections kept.
    pub capacity: usize,
    /// Connections opened over the pool's lifetime, replacements included.
    pub created: u64,
    /// Connections replaced after a failed ping or a non-reusable error.
    pub replaced: u64,
    /// Connections closed because the pool was full on release.
    pub dropped: u64,
}
