//! In-Memory Pool Registry
//!
//! Pools reported by backend drivers, kept in registration order so that
//! selection results are stable.

use crate::domain::ports::{Pool, PoolRegistry};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemoryPoolRegistry {
    pools: RwLock<Vec<Pool>>,
}

impl InMemoryPoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(pools: Vec<Pool>) -> Self {
        Self {
            pools: RwLock::new(pools),
        }
    }

    /// Insert a pool, or replace the one with the same ID in place
    pub fn upsert(&self, pool: Pool) {
        let mut pools = self.pools.write();
        match pools.iter_mut().find(|p| p.id == pool.id) {
            Some(existing) => {
                debug!(pool = %pool.id, "Updating pool");
                *existing = pool;
            }
            None => {
                debug!(pool = %pool.id, "Registering pool");
                pools.push(pool);
            }
        }
    }

    pub fn remove(&self, pool_id: &str) -> Result<Pool> {
        let mut pools = self.pools.write();
        let index = pools
            .iter()
            .position(|p| p.id == pool_id)
            .ok_or_else(|| Error::Registry(format!("pool not found: {}", pool_id)))?;
        Ok(pools.remove(index))
    }

    /// Swap the whole pool set, e.g. after a full driver resync
    pub fn replace_all(&self, pools: Vec<Pool>) {
        *self.pools.write() = pools;
    }

    pub fn get(&self, pool_id: &str) -> Option<Pool> {
        self.pools.read().iter().find(|p| p.id == pool_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }
}

#[async_trait]
impl PoolRegistry for InMemoryPoolRegistry {
    async fn list_pools(&self) -> Result<Vec<Pool>> {
        Ok(self.pools.read().clone())
    }
}
