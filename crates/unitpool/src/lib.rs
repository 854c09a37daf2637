//! # unitpool
//!
//! Bounded database connection pool with unit-of-work clients.
//!
//! A [`Pool`] pre-creates a fixed number of connections to one database and
//! hands them out with a timeout and a bounded number of retries. A
//! [`Registry`] maps pool names to pools. On top of that sit two clients
//! that hold a single connection for their whole lifetime:
//!
//! - [`Conn`] commits every statement as it runs.
//! - [`Trans`] runs everything inside one explicit transaction.
//!
//! ## Features
//!
//! - Portable `?` placeholders, rewritten to the driver's native syntax
//! - Stale connections pinged (and reconnected) on acquisition
//! - Error-driven recycling: statement errors keep the connection,
//!   transport errors replace it with a fresh one
//! - Batched, lazily fetched result ranges
//! - Decimal and datetime values normalized for serialization
//!
//! The wire protocol lives in a separate backend crate implementing
//! [`Driver`], such as `unitpool-mysql`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use unitpool::{Conn, ConnectOptions, Pool, PoolConfig, Queryable, Registry, params};
//! use unitpool_mysql::MySqlDriver;
//!
//! let config = PoolConfig::new()
//!     .connect(ConnectOptions::from_env()?)
//!     .name("main")
//!     .size(10);
//!
//! let registry = Registry::new();
//! registry.register(Pool::new(Arc::new(MySqlDriver::new()), config).await?)?;
//!
//! let mut conn = Conn::open(&registry, "main").await?;
//! let rows = conn.query("SELECT * FROM users WHERE active = ?", params![true]).await?;
//! conn.close().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod pool;
pub mod registry;
pub mod sql;
pub mod transaction;
pub mod value;

pub use client::{Conn, DEFAULT_BATCH_SIZE, Queryable, RowRange};
pub use config::{ConnectOptions, MAX_POOL_SIZE, MIN_POOL_SIZE, PoolConfig, clamp_pool_size};
pub use connection::Connection;
pub use driver::{Cursor, Driver, ExecuteResult, Session};
pub use error::{DriverError, Error, ErrorKind, Result};
pub use lifecycle::ConnectionMetadata;
pub use pool::{Pool, PoolStatus};
pub use registry::Registry;
pub use transaction::Trans;
pub use value::{DATETIME_FORMAT, Row, Value};
