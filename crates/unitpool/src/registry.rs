//! Name to pool mapping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::pool::Pool;

/// Shared mapping from pool name to [`Pool`].
///
/// A registry is populated at startup and handed to whatever needs to open
/// clients by pool name. Clones share the same mapping.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pools: Arc<RwLock<HashMap<String, Pool>>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pool` under its name, replacing any pool of the same name.
    pub fn register(&self, pool: Pool) -> Result<()> {
        let name = pool.name().to_string();
        if name.is_empty() {
            return Err(Error::InvalidRegistration(
                "pool name cannot be empty".into(),
            ));
        }
        if self.pools.write().insert(name.clone(), pool).is_some() {
            tracing::debug!(pool = %name, "replaced registered pool");
        } else {
            tracing::debug!(pool = %name, "registered pool");
        }
        Ok(())
    }

    /// Find the pool registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<Pool> {
        self.pools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PoolNotFound(name.to_string()))
    }

    /// Check if a pool is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.pools.read().contains_key(name)
    }

    /// Names of all registered pools, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    /// Check if no pool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }
}
