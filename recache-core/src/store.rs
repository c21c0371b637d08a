//! Cache-like store contract.
//!
//! Every enhancer keeps its state in a [`CacheLike`] store: a synchronous,
//! single-key get/set/remove interface. Eviction and expiry are the store's
//! business; a key the store silently dropped is simply a miss.
//!
//! Implementations in this workspace:
//! - [`MapStore`] - unbounded, `DashMap`-backed, handy for tests and
//!   per-request overrides
//! - `MokaStore` (in `recache-moka`) - bounded with optional TTL, the default

use std::sync::Arc;

use dashmap::DashMap;

use crate::key::CacheKey;

/// Synchronous key-value store used by enhancers.
///
/// Operations must be atomic per key. Enhancers rely on `set` being visible
/// to the next `get` on any thread, which is how concurrent identical
/// requests find the in-flight handle.
pub trait CacheLike<V>: Send + Sync {
    /// Returns a clone of the stored value.
    fn get(&self, key: &CacheKey) -> Option<V>;

    /// Stores a value, replacing any previous one.
    fn set(&self, key: &CacheKey, value: V);

    /// Removes a value. Removing a missing key is a no-op.
    fn remove(&self, key: &CacheKey);
}

/// Type-erased shared store.
pub type SharedStore<V> = Arc<dyn CacheLike<V>>;

impl<V, S> CacheLike<V> for Arc<S>
where
    S: CacheLike<V> + ?Sized,
{
    fn get(&self, key: &CacheKey) -> Option<V> {
        (**self).get(key)
    }

    fn set(&self, key: &CacheKey, value: V) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &CacheKey) {
        (**self).remove(key)
    }
}

/// Unbounded in-process store.
///
/// Clones share the same map.
#[derive(Debug)]
pub struct MapStore<V> {
    inner: Arc<DashMap<CacheKey, V>>,
}

impl<V> MapStore<V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// `true` when the key is stored.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl<V> Default for MapStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for MapStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> CacheLike<V> for MapStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &CacheKey) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &CacheKey, value: V) {
        self.inner.insert(key.clone(), value);
    }

    fn remove(&self, key: &CacheKey) {
        self.inner.remove(key);
    }
}
