//! Connection lifecycle bookkeeping.
//!
//! Timestamps use [`tokio::time::Instant`] so that paused-time tests can
//! move a connection past its staleness threshold.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique connection identifier.
pub(crate) fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Metadata about a connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection.
    pub id: u64,
    /// When the connection was created.
    pub created_at: Instant,
    /// When the connection was last validated. Only pinging refreshes it.
    pub last_used_at: Instant,
    /// Number of times the connection has been checked out of a pool.
    pub checkout_count: u64,
}

impl ConnectionMetadata {
    /// Create metadata for a new connection.
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used_at: now,
            checkout_count: 0,
        }
    }

    /// Time since the connection was last validated.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    /// Check if the connection has been idle longer than `threshold`.
    #[must_use]
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.idle_for() > threshold
    }

    /// Mark the connection as checked out.
    pub fn mark_checkout(&mut self) {
        self.checkout_count += 1;
    }

    /// Mark the connection as validated now.
    pub fn mark_used(&mut self) {
        self.last_used_at = Instant::now();
    }
}
