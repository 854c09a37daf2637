//! MySQL integration tests.
//!
//! These tests require a running MySQL server. They are ignored by default
//! and can be run with:
//!
//! ```bash
//! export MYSQL_HOST=127.0.0.1
//! export MYSQL_USER=root
//! export MYSQL_PASSWORD=unitpool
//! export MYSQL_DATABASE=test_unitpool
//!
//! cargo test -p unitpool-mysql --test mysql -- --ignored
//! ```
//!
//! The container test starts its own server and needs Docker instead.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use unitpool::{
    Conn, ConnectOptions, ErrorKind, Pool, PoolConfig, Queryable, Registry, Trans, Value, params,
};
use unitpool_mysql::MySqlDriver;
use unitpool_testing::fixtures::{
    CREATE_ACCOUNT_TABLE, CREDIT, DEBIT, DROP_ACCOUNT_TABLE, INSERT_ACCOUNT, SELECT_BALANCE,
};

/// Connection options from the environment, if a server is configured.
fn get_test_options() -> Option<ConnectOptions> {
    std::env::var("MYSQL_HOST").ok()?;
    let options = ConnectOptions::from_env().ok()?;
    if options.database.is_empty() {
        Some(options.database("test_unitpool"))
    } else {
        Some(options)
    }
}

async fn test_pool(name: &str) -> Pool {
    let options = get_test_options().expect("MySQL config required");
    let config = PoolConfig::new().connect(options).name(name);
    Pool::new(Arc::new(MySqlDriver::new()), config)
        .await
        .expect("Failed to create pool")
}

// =============================================================================
// Pool Behaviour
// =============================================================================

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_pool_prefills_and_recycles() {
    let pool = test_pool("mysql-prefill").await;
    let status = pool.status();
    assert_eq!(status.idle, 3);
    assert_eq!(status.created, 3);

    let mut conn = Conn::from_pool(&pool).await.unwrap();
    assert_eq!(pool.size(), 2);
    let row = conn.query_one("SELECT 1 AS one", params![]).await.unwrap();
    assert_eq!(row.unwrap()["one"], Value::Int(1));
    conn.close().await;

    assert_eq!(pool.size(), 3);
    assert_eq!(pool.status().replaced, 0);
}

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_stale_connections_are_pinged() {
    let options = get_test_options().expect("MySQL config required");
    let config = PoolConfig::new()
        .connect(options)
        .name("mysql-stale")
        .stale_after(Duration::ZERO);
    let pool = Pool::new(Arc::new(MySqlDriver::new()), config)
        .await
        .unwrap();

    for _ in 0..5 {
        let mut conn = Conn::from_pool(&pool).await.unwrap();
        conn.query_one("SELECT 1", params![]).await.unwrap();
        conn.close().await;
    }
    assert_eq!(pool.status().replaced, 0);
}

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_integrity_error_keeps_connection() {
    let pool = test_pool("mysql-integrity").await;
    let mut conn = Conn::from_pool(&pool).await.unwrap();
    conn.execute(
        "CREATE TEMPORARY TABLE tag (name VARCHAR(32) PRIMARY KEY)",
        params![],
    )
    .await
    .unwrap();
    conn.execute("INSERT INTO tag (name) VALUES (?)", params!["red"])
        .await
        .unwrap();

    let err = conn
        .execute("INSERT INTO tag (name) VALUES (?)", params!["red"])
        .await
        .unwrap_err();
    let driver_error = err.driver_error().unwrap();
    assert_eq!(driver_error.kind(), ErrorKind::Integrity);
    assert_eq!(driver_error.code(), Some(1062));

    // The session survives and the temporary table is still there.
    let rows = conn.query("SELECT name FROM tag", params![]).await.unwrap();
    assert_eq!(rows.len(), 1);
    conn.close().await;

    let status = pool.status();
    assert_eq!(status.idle, 3);
    assert_eq!(status.replaced, 0);
}

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_killed_connection_is_replaced() {
    let pool = test_pool("mysql-killed").await;
    let mut conn = Conn::from_pool(&pool).await.unwrap();

    let err = conn
        .execute("KILL CONNECTION_ID()", params![])
        .await
        .unwrap_err();
    assert!(!err.is_reusable());
    conn.close().await;

    let status = pool.status();
    assert_eq!(status.idle, 3);
    assert_eq!(status.replaced, 1);
    assert_eq!(status.created, 4);

    let mut conn = Conn::from_pool(&pool).await.unwrap();
    conn.query_one("SELECT 1", params![]).await.unwrap();
    conn.close().await;
}

// =============================================================================
// Values
// =============================================================================

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_row_encoding() {
    let pool = test_pool("mysql-encoding").await;
    let mut conn = Conn::from_pool(&pool).await.unwrap();

    let row = conn
        .query_one(
            "SELECT CAST(10.99 AS DECIMAL(10,2)) AS price, \
             CAST('2023-01-01 12:30:45' AS DATETIME) AS created, \
             'plain' AS label, NULL AS missing",
            params![],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["price"], Value::Float(10.99));
    assert_eq!(row["created"], Value::Text("2023-01-01 12:30:45".into()));
    assert_eq!(row["label"], Value::Text("plain".into()));
    assert_eq!(row["missing"], Value::Null);

    // Parameters take the binary protocol path.
    let row = conn
        .query_one("SELECT CAST(? AS DECIMAL(10,2)) AS price", params!["3.50"])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["price"], Value::Float(3.5));
    conn.close().await;
}

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_query_range_streams_all_rows() {
    let pool = test_pool("mysql-range").await;
    let mut conn = Conn::from_pool(&pool).await.unwrap();

    let rows: Vec<_> = conn
        .query_range(
            "SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT 3 UNION ALL SELECT 4",
            params![],
            3,
        )
        .try_collect()
        .await
        .unwrap();
    let values: Vec<_> = rows.iter().map(|row| row["n"].as_i64().unwrap()).collect();
    assert_eq!(values, vec![1, 2, 3, 4]);

    assert!(
        conn.query("SELECT 1 FROM DUAL WHERE 1 = 0", params![])
            .await
            .unwrap()
            .is_empty()
    );
    conn.close().await;
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
#[ignore = "Requires MySQL"]
async fn test_transfer_commit_and_rollback() {
    let registry = Registry::new();
    registry.register(test_pool("mysql-transfer").await).unwrap();

    let mut conn = Conn::open(&registry, "mysql-transfer").await.unwrap();
    conn.execute(DROP_ACCOUNT_TABLE, params![]).await.unwrap();
    conn.execute(CREATE_ACCOUNT_TABLE, params![]).await.unwrap();
    let alice = conn.insert(INSERT_ACCOUNT, params!["alice", 1000]).await.unwrap();
    let bob = conn.insert(INSERT_ACCOUNT, params!["bob", 1000]).await.unwrap();
    assert_eq!(alice + 1, bob);
    conn.close().await;

    let mut trans = Trans::open(&registry, "mysql-transfer").await.unwrap();
    assert_eq!(trans.execute(DEBIT, params![100, alice]).await, Some(1));
    assert_eq!(trans.execute(CREDIT, params![100, bob]).await, Some(1));
    trans.commit().await.unwrap();
    trans.close().await;

    let mut trans = Trans::open(&registry, "mysql-transfer").await.unwrap();
    assert_eq!(trans.execute(DEBIT, params![500, alice]).await, Some(1));
    trans.rollback().await.unwrap();
    trans.close().await;

    // Closing with the transaction still open rolls it back.
    let mut trans = Trans::open(&registry, "mysql-transfer").await.unwrap();
    assert_eq!(trans.execute(DEBIT, params![250, alice]).await, Some(1));
    trans.close().await;

    let mut conn = Conn::open(&registry, "mysql-transfer").await.unwrap();
    let alice_row = conn
        .query_one(SELECT_BALANCE, params![alice])
        .await
        .unwrap()
        .unwrap();
    let bob_row = conn
        .query_one(SELECT_BALANCE, params![bob])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alice_row["balance"], Value::Float(900.0));
    assert_eq!(bob_row["balance"], Value::Float(1100.0));

    conn.execute(DROP_ACCOUNT_TABLE, params![]).await.unwrap();
    conn.close().await;
}

// =============================================================================
// Container
// =============================================================================

#[tokio::test]
#[ignore = "Requires Docker"]
async fn test_container_roundtrip() {
    use testcontainers::runners::AsyncRunner;
    use unitpool_testing::{MYSQL_PORT, MySqlContainer};

    let image = MySqlContainer::new();
    let container = image.clone().start().await.unwrap();
    let port = container.get_host_port_ipv4(MYSQL_PORT).await.unwrap();
    let options = image.connect_options("127.0.0.1", port);

    let config = PoolConfig::new().connect(options).name("container");
    let pool = Pool::new(Arc::new(MySqlDriver::new()), config)
        .await
        .unwrap();
    let mut conn = Conn::from_pool(&pool).await.unwrap();
    let row = conn
        .query_one("SELECT DATABASE() AS db", params![])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["db"], Value::Text("test_unitpool".into()));
    conn.close().await;
}
