//! Account transfer against a real MySQL server.
//!
//! Creates an `account` table, moves money between two accounts inside a
//! transaction, then shows a rolled-back transfer leaving balances intact.
//!
//! # Running
//!
//! ```bash
//! export MYSQL_HOST=127.0.0.1
//! export MYSQL_USER=root
//! export MYSQL_PASSWORD=unitpool
//! export MYSQL_DATABASE=test_unitpool
//!
//! RUST_LOG=unitpool=debug cargo run -p unitpool-mysql --example transfer
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use unitpool::{Conn, ConnectOptions, Pool, PoolConfig, Queryable, Registry, Trans, params};
use unitpool_mysql::MySqlDriver;
use unitpool_testing::fixtures::{
    CREATE_ACCOUNT_TABLE, CREDIT, DEBIT, DROP_ACCOUNT_TABLE, INSERT_ACCOUNT,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = ConnectOptions::from_env()?;
    let config = PoolConfig::new()
        .connect(options)
        .name("bank")
        .size(4)
        .acquire_timeout(Duration::from_secs(2));

    println!("=== Account Transfer Example ===\n");

    let pool = Pool::new(Arc::new(MySqlDriver::new()), config).await?;
    let registry = Registry::new();
    registry.register(pool.clone())?;

    let mut conn = Conn::open(&registry, "bank").await?;
    conn.execute(DROP_ACCOUNT_TABLE, params![]).await?;
    conn.execute(CREATE_ACCOUNT_TABLE, params![]).await?;
    let alice = conn.insert(INSERT_ACCOUNT, params!["alice", 1000]).await?;
    let bob = conn.insert(INSERT_ACCOUNT, params!["bob", 1000]).await?;
    conn.close().await;

    println!("1. Committed transfer of 100:");
    let mut trans = Trans::open(&registry, "bank").await?;
    trans.execute(DEBIT, params![100, alice]).await.ok_or("debit failed")?;
    trans.execute(CREDIT, params![100, bob]).await.ok_or("credit failed")?;
    trans.commit().await?;
    trans.close().await;
    print_balances(&registry).await?;

    println!("\n2. Rolled-back transfer of 500:");
    let mut trans = Trans::open(&registry, "bank").await?;
    trans.execute(DEBIT, params![500, alice]).await.ok_or("debit failed")?;
    trans.rollback().await?;
    trans.close().await;
    print_balances(&registry).await?;

    let status = pool.status();
    println!(
        "\nPool: {} idle of {}, {} created, {} replaced",
        status.idle, status.capacity, status.created, status.replaced
    );

    let mut conn = Conn::open(&registry, "bank").await?;
    conn.execute(DROP_ACCOUNT_TABLE, params![]).await?;
    conn.close().await;
    Ok(())
}

async fn print_balances(registry: &Registry) -> Result<(), unitpool::Error> {
    let mut conn = Conn::open(registry, "bank").await?;
    for row in conn
        .query("SELECT name, balance FROM account ORDER BY id", params![])
        .await?
    {
        println!("  {:<6} {}", row["name"].as_str().unwrap_or("?"), row["balance"]);
    }
    conn.close().await;
    Ok(())
}
