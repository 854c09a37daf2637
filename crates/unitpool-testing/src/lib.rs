//! # unitpool-testing
//!
//! Test infrastructure for `unitpool` and its backends.
//!
//! ## Features
//!
//! - In-memory mock driver with scripted responses (no Docker required)
//! - Snapshot transactions over a shared key-value store
//! - Connect and ping failure injection, call counters
//! - MySQL container image for testcontainers
//! - Account transfer fixture shared by mock and MySQL tests
//!
//! ## Mock Driver Example
//!
//! ```rust,ignore
//! use unitpool::{Conn, Pool, PoolConfig, Queryable, Value, params};
//! use unitpool_testing::mock::{MockDriver, MockResponse};
//!
//! #[tokio::test]
//! async fn test_with_mock_driver() {
//!     let driver = MockDriver::builder()
//!         .with_response(
//!             "SELECT name FROM users WHERE id = ?",
//!             MockResponse::rows(&["name"], vec![vec![Value::from("alice")]]),
//!         )
//!         .build();
//!
//!     let pool = Pool::new(driver.handle(), PoolConfig::new()).await.unwrap();
//!     let mut conn = Conn::from_pool(&pool).await.unwrap();
//!     let row = conn.query_one("SELECT name FROM users WHERE id = ?", params![1]).await.unwrap();
//!     conn.close().await;
//! }
//! ```
//!
//! ## Container Example
//!
//! ```rust,ignore
//! use testcontainers::runners::AsyncRunner;
//! use unitpool_testing::{MYSQL_PORT, MySqlContainer};
//!
//! let image = MySqlContainer::default();
//! let container = image.clone().start().await?;
//! let port = container.get_host_port_ipv4(MYSQL_PORT).await?;
//! let options = image.connect_options("127.0.0.1", port);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod container;
pub mod fixtures;
pub mod mock;

pub use container::{MYSQL_PORT, MySqlContainer};
pub use mock::{MockDriver, MockDriverBuilder, MockError, MockResponse, MockStats, MockStore};
