//! Registry of independently configured pools
//!
//! Pools of different object types live side by side, keyed by a category.
//! The registry holds no pooling logic of its own; every operation delegates
//! to the [`ObjectPool`] registered under the key.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::metrics::PoolStats;
use crate::pool::ObjectPool;

/// Type-erased view of a pool, so pools of different object types can share
/// one map.
#[async_trait]
trait ManagedPool: Send + Sync {
    fn stats(&self) -> PoolStats;

    fn resize(&self, target: usize) -> PoolResult<()>;

    async fn close(&self, timeout: Duration) -> PoolResult<()>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[async_trait]
impl<T: Send + 'static> ManagedPool for ObjectPool<T> {
    fn stats(&self) -> PoolStats {
        ObjectPool::stats(self)
    }

    fn resize(&self, target: usize) -> PoolResult<()> {
        ObjectPool::resize(self, target)
    }

    async fn close(&self, timeout: Duration) -> PoolResult<()> {
        ObjectPool::close(self, timeout).await
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Registry of pools keyed by category
///
/// The default key is [`TypeId`], giving one pool per object type.
///
/// # Examples
///
/// ```
/// use lifecycle_pool::{PoolConfiguration, PoolRegistry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = PoolRegistry::<&'static str>::new();
/// registry.register("buffers", PoolConfiguration::new(|| Ok(vec![0u8; 1024]))).unwrap();
///
/// let pool = registry.get::<Vec<u8>>(&"buffers").unwrap();
/// let buffer = pool.acquire().unwrap();
/// assert_eq!(buffer.len(), 1024);
/// assert_eq!(registry.stats()[&"buffers"].in_use, 1);
/// # }
/// ```
pub struct PoolRegistry<K = TypeId> {
    pools: DashMap<K, Arc<dyn ManagedPool>>,
    closed: AtomicBool,
}

impl<K> PoolRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> PoolResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(PoolError::Closed)
        } else {
            Ok(())
        }
    }

    fn downcast<T: Send + 'static>(
        key: &K,
        pool: Arc<dyn ManagedPool>,
    ) -> PoolResult<Arc<ObjectPool<T>>> {
        pool.into_any()
            .downcast::<ObjectPool<T>>()
            .map_err(|_| PoolError::TypeMismatch(format!("{key:?}")))
    }

    fn lookup(&self, key: &K) -> PoolResult<Arc<dyn ManagedPool>> {
        self.ensure_open()?;
        self.pools
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PoolError::PoolNotFound(format!("{key:?}")))
    }

    /// Create a pool under `key`
    ///
    /// The pool is built (including its initial objects) while the key is
    /// locked, so the factory must not call back into this registry.
    pub fn register<T: Send + 'static>(
        &self,
        key: K,
        config: PoolConfiguration<T>,
    ) -> PoolResult<Arc<ObjectPool<T>>> {
        self.ensure_open()?;
        match self.pools.entry(key) {
            Entry::Occupied(entry) => {
                Err(PoolError::AlreadyRegistered(format!("{:?}", entry.key())))
            }
            Entry::Vacant(entry) => {
                let pool = Arc::new(ObjectPool::new(config)?);
                debug!(key = ?entry.key(), "pool registered");
                entry.insert(Arc::clone(&pool) as Arc<dyn ManagedPool>);
                Ok(pool)
            }
        }
    }

    /// Look up the pool registered under `key`
    pub fn get<T: Send + 'static>(&self, key: &K) -> PoolResult<Arc<ObjectPool<T>>> {
        let pool = self.lookup(key)?;
        Self::downcast(key, pool)
    }

    /// Look up the pool under `key`, creating it from `config` if missing
    pub fn get_or_create<T: Send + 'static>(
        &self,
        key: K,
        config: PoolConfiguration<T>,
    ) -> PoolResult<Arc<ObjectPool<T>>> {
        self.ensure_open()?;
        match self.pools.entry(key) {
            Entry::Occupied(entry) => {
                let pool = Arc::clone(entry.get());
                Self::downcast(entry.key(), pool)
            }
            Entry::Vacant(entry) => {
                let pool = Arc::new(ObjectPool::new(config)?);
                debug!(key = ?entry.key(), "pool created on first use");
                entry.insert(Arc::clone(&pool) as Arc<dyn ManagedPool>);
                Ok(pool)
            }
        }
    }

    /// Unregister the pool under `key` and close it
    pub async fn remove(&self, key: &K, timeout: Duration) -> PoolResult<()> {
        self.ensure_open()?;
        let (_, pool) = self
            .pools
            .remove(key)
            .ok_or_else(|| PoolError::PoolNotFound(format!("{key:?}")))?;
        debug!(?key, "pool unregistered");
        pool.close(timeout).await
    }

    /// Resize the pool under `key`
    pub fn resize(&self, key: &K, target: usize) -> PoolResult<()> {
        self.lookup(key)?.resize(target)
    }

    /// Keys of all registered pools
    pub fn categories(&self) -> Vec<K> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Metrics snapshot of every registered pool
    pub fn stats(&self) -> HashMap<K, PoolStats> {
        self.pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Sum of the metrics of every registered pool
    pub fn total_stats(&self) -> PoolStats {
        self.pools
            .iter()
            .fold(PoolStats::default(), |total, entry| total.merge(&entry.value().stats()))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Close every pool and refuse further use of the registry
    ///
    /// Only the first call does anything. All pools are closed even if some
    /// fail; the first failure is returned.
    pub async fn close_all(&self, timeout: Duration) -> PoolResult<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let pools: Vec<(K, Arc<dyn ManagedPool>)> = self
            .pools
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        self.pools.clear();

        let mut result = Ok(());
        for (key, pool) in pools {
            if let Err(err) = pool.close(timeout).await {
                warn!(?key, error = %err, "failed to close pool");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        debug!("all pools closed");
        result
    }
}

impl PoolRegistry<TypeId> {
    /// Register the pool for object type `T`
    pub fn register_type<T: Send + 'static>(
        &self,
        config: PoolConfiguration<T>,
    ) -> PoolResult<Arc<ObjectPool<T>>> {
        self.register(TypeId::of::<T>(), config)
    }

    /// Pool for object type `T`
    pub fn pool_for<T: Send + 'static>(&self) -> PoolResult<Arc<ObjectPool<T>>> {
        self.get(&TypeId::of::<T>())
    }

    /// Pool for object type `T`, created from `config` if missing
    pub fn get_or_create_type<T: Send + 'static>(
        &self,
        config: PoolConfiguration<T>,
    ) -> PoolResult<Arc<ObjectPool<T>>> {
        self.get_or_create(TypeId::of::<T>(), config)
    }
}

impl<K> Default for PoolRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for PoolRegistry<K>
where
    K: Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<_> = self.pools.iter().map(|entry| format!("{:?}", entry.key())).collect();
        f.debug_struct("PoolRegistry")
            .field("pools", &keys)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings() -> PoolConfiguration<String> {
        PoolConfiguration::new(|| Ok(String::from("conn"))).with_max_size(4)
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry: PoolRegistry = PoolRegistry::new();
        let pool = registry.register_type(strings().with_initial_size(2)).unwrap();

        let same = registry.pool_for::<String>().unwrap();
        assert!(Arc::ptr_eq(&pool, &same));
        assert_eq!(same.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = PoolRegistry::new();
        registry.register("db", strings()).unwrap();

        assert!(matches!(
            registry.register("db", strings()),
            Err(PoolError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_type_mismatch_and_missing() {
        let registry = PoolRegistry::new();
        registry.register("db", strings()).unwrap();

        assert!(matches!(registry.get::<u64>(&"db"), Err(PoolError::TypeMismatch(_))));
        assert!(matches!(registry.get::<String>(&"cache"), Err(PoolError::PoolNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_or_create_reuses() {
        let registry: PoolRegistry = PoolRegistry::new();
        let first = registry.get_or_create_type(strings().with_initial_size(1)).unwrap();
        let second = registry.get_or_create_type(strings().with_initial_size(3)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_leaves_no_entry() {
        let registry = PoolRegistry::new();

        assert!(registry.register("db", strings().with_max_size(0)).is_err());
        assert!(registry.is_empty());
    }
}
