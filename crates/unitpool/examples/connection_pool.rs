//! Connection pooling walkthrough.
//!
//! Runs against the in-memory mock driver, so no database is needed. It
//! shows acquisition and release, exhaustion, connection replacement after
//! a transport failure, and pool status.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=unitpool=debug cargo run -p unitpool --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio::time::Instant;
use tracing_subscriber::EnvFilter;
use unitpool::{Conn, ErrorKind, Pool, PoolConfig, Queryable, Registry, Value, params};
use unitpool_testing::{MockDriver, MockResponse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let driver = MockDriver::builder()
        .with_response(
            "SELECT id, name FROM product",
            MockResponse::rows(
                &["id", "name"],
                vec![
                    vec![Value::Int(1), "kettle".into()],
                    vec![Value::Int(2), "teapot".into()],
                    vec![Value::Int(3), "mug".into()],
                ],
            ),
        )
        .with_response(
            "SELECT SLEEP(60)",
            MockResponse::error(ErrorKind::Operational, 2013, "Lost connection to MySQL server"),
        )
        .build();

    println!("=== Connection Pool Example ===\n");

    let config = PoolConfig::new()
        .name("shop")
        .size(3)
        .acquire_timeout(Duration::from_millis(200))
        .retry_count(1);
    println!("Pool configuration:");
    println!("  Size: {}", config.size);
    println!("  Acquire timeout: {:?}", config.acquire_timeout);
    println!("  Retries: {}", config.retry_count);
    println!();

    let pool = Pool::new(driver.handle(), config).await?;
    let registry = Registry::new();
    registry.register(pool.clone())?;
    print_pool_status(&pool);

    // Example 1: Basic usage
    println!("\n1. Basic usage:");
    {
        let mut conn = Conn::open(&registry, "shop").await?;
        for row in conn.query("SELECT id, name FROM product", params![]).await? {
            println!("  {} {}", row["id"], row["name"]);
        }
        conn.close().await;
    }

    // Example 2: Streaming in batches
    println!("\n2. Streaming two rows at a time:");
    {
        let mut conn = Conn::open(&registry, "shop").await?;
        let mut range = conn.query_range("SELECT id, name FROM product", params![], 2);
        while let Some(row) = range.next().await {
            println!("  {}", row?["name"]);
        }
        drop(range);
        conn.close().await;
    }

    // Example 3: Exhaustion
    println!("\n3. Holding every connection:");
    {
        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(Conn::open(&registry, "shop").await?);
        }
        let start = Instant::now();
        match Conn::open(&registry, "shop").await {
            Ok(_) => println!("  unexpectedly acquired a connection"),
            Err(e) => println!("  {e} (after {:?})", start.elapsed()),
        }
        for mut conn in held {
            conn.close().await;
        }
    }

    // Example 4: Replacement after a transport failure
    println!("\n4. Transport failure:");
    {
        let mut conn = Conn::open(&registry, "shop").await?;
        if let Err(e) = conn.query("SELECT SLEEP(60)", params![]).await {
            println!("  query failed: {e} (reusable: {})", e.is_reusable());
        }
        conn.close().await;
    }

    println!();
    print_pool_status(&pool);
    println!("\nDriver calls: {:?}", driver.stats());
    Ok(())
}

fn print_pool_status(pool: &Pool) {
    let status = pool.status();
    println!("Pool status ({}):", pool.name());
    println!("  Idle: {}/{}", status.idle, status.size);
    println!("  Created: {}", status.created);
    println!("  Replaced: {}", status.replaced);
    println!("  Dropped: {}", status.dropped);
}
