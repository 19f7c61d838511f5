//! # Registry: every live pool of a process.
//!
//! The registry is an explicit object owned by the program's entry point. It
//! tracks pools so that a process-wide termination can close all of them.
//!
//! ## Architecture
//! ```text
//! register(pool) ──► pools[pool.id] = pool
//!                └─► watcher: pool.closed() ──► pools.remove(pool.id)
//!
//! close_on_signal() ──► wait_for_shutdown_signal() ──► close_all()
//!                                                       └─► pool.close(None) × registered
//! ```
//!
//! ## Rules
//! - A pool leaves the registry once, when it closes (any reason).
//! - `close_all` is best-effort and unordered across pools.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::server::Server;
use super::shutdown;

/// Registry of live pools.
#[derive(Default)]
pub struct Registry {
    pools: RwLock<HashMap<String, Arc<Server>>>,
}

impl Registry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Tracks `pool` until it closes.
    ///
    /// Must be called inside a Tokio runtime (spawns the deregistration watcher).
    pub async fn register(self: &Arc<Self>, pool: Arc<Server>) {
        let id = pool.id().to_string();
        let closed = pool.closed_token();
        self.pools.write().await.insert(id.clone(), pool);
        tracing::debug!(pool = %id, "pool registered");

        let me = Arc::clone(self);
        tokio::spawn(async move {
            closed.cancelled().await;
            if me.pools.write().await.remove(&id).is_some() {
                tracing::debug!(pool = %id, "pool deregistered");
            }
        });
    }

    /// Returns a registered pool by id.
    pub async fn get(&self, id: &str) -> Option<Arc<Server>> {
        self.pools.read().await.get(id).cloned()
    }

    /// Returns sorted list of registered pool ids.
    pub async fn list(&self) -> Vec<String> {
        let pools = self.pools.read().await;
        let mut ids: Vec<String> = pools.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered pools.
    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    /// Returns true if no pool is registered.
    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }

    /// Closes and deregisters every registered pool; returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let pools: Vec<(String, Arc<Server>)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };

        for (id, pool) in &pools {
            tracing::debug!(pool = %id, "closing pool");
            pool.close(None);
        }
        pools.len()
    }

    /// Waits for a termination signal, then closes every registered pool.
    ///
    /// Returns the number of pools closed, or `Err` if signal registration fails.
    pub async fn close_on_signal(&self) -> std::io::Result<usize> {
        shutdown::wait_for_shutdown_signal().await?;
        tracing::info!("termination signal received, closing pools");
        Ok(self.close_all().await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{MockSpawner, test_config};

    async fn wait_until_empty(registry: &Registry) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !registry.is_empty().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    fn pool(spawner: &Arc<MockSpawner>, workers: usize) -> Arc<Server> {
        Server::builder(test_config(workers))
            .build(spawner.as_ref())
            .unwrap()
    }

    #[tokio::test]
    async fn closed_pool_is_deregistered() {
        let registry = Registry::new();
        let spawner = MockSpawner::new();
        let server = pool(&spawner, 2);

        registry.register(Arc::clone(&server)).await;
        assert_eq!(registry.list().await, vec![server.id().to_string()]);
        assert!(registry.get(server.id()).await.is_some());

        server.close(None);
        wait_until_empty(&registry).await;
    }

    #[tokio::test]
    async fn cascade_deregisters_pool() {
        let registry = Registry::new();
        let spawner = MockSpawner::new();
        let server = pool(&spawner, 1);
        registry.register(server).await;

        spawner.workers()[0].kill(None);
        wait_until_empty(&registry).await;
    }

    #[tokio::test]
    async fn already_closed_pool_does_not_linger() {
        let registry = Registry::new();
        let spawner = MockSpawner::new();
        let server = pool(&spawner, 1);
        server.close(None);

        registry.register(server).await;
        wait_until_empty(&registry).await;
    }

    #[tokio::test]
    async fn close_all_closes_every_pool() {
        let registry = Registry::new();
        let spawner = MockSpawner::new();
        let a = pool(&spawner, 2);
        let b = pool(&spawner, 3);
        registry.register(Arc::clone(&a)).await;
        registry.register(Arc::clone(&b)).await;
        assert_eq!(registry.len().await, 2);

        assert_eq!(registry.close_all().await, 2);
        assert!(a.is_closed() && b.is_closed());
        assert!(registry.is_empty().await);
        assert!(spawner.workers().iter().all(|w| w.is_closed()));
        assert_eq!(registry.close_all().await, 0);
    }
}
