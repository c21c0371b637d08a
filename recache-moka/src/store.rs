//! Moka store implementation.

use moka::sync::Cache;
use recache_core::{CacheKey, CacheLike};
use smol_str::SmolStr;

use crate::builder::{MokaStoreBuilder, NoCapacity};
use crate::metrics;

/// Bounded in-memory store powered by Moka.
///
/// Clones share the same underlying cache.
///
/// # Caveats
///
/// - Expiry is measured on Moka's own clock, not tokio's. A paused tokio
///   runtime does not age entries.
/// - Eviction is asynchronous inside Moka: an over-capacity store may briefly
///   hold more entries than configured.
#[derive(Clone)]
pub struct MokaStore<V> {
    pub(crate) cache: Cache<CacheKey, V>,
    pub(crate) label: SmolStr,
}

impl<V> std::fmt::Debug for MokaStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("label", &self.label)
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}

impl<V> MokaStore<V> {
    /// Creates a new builder.
    pub fn builder() -> MokaStoreBuilder<V, NoCapacity> {
        MokaStoreBuilder::new()
    }

    /// Returns the label of this store.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<V> MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store holding at most `max_entries` entries, without expiry.
    pub fn new(max_entries: u64) -> Self {
        Self::builder().max_entries(max_entries).build()
    }

    /// Returns the underlying Moka cache.
    pub fn cache(&self) -> &Cache<CacheKey, V> {
        &self.cache
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl<V> CacheLike<V> for MokaStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &CacheKey) -> Option<V> {
        self.cache.get(key)
    }

    fn set(&self, key: &CacheKey, value: V) {
        self.cache.insert(key.clone(), value);
        metrics::record_entries(&self.label, self.cache.entry_count());
    }

    fn remove(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }
}
