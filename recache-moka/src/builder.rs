//! Builder for configuring [`MokaStore`].

use std::marker::PhantomData;
use std::time::Duration;

use moka::policy::EvictionPolicy;
use moka::sync::CacheBuilder;
use smol_str::SmolStr;

use crate::store::MokaStore;

/// Marker type: capacity has not been configured yet.
///
/// This is the initial state of a [`MokaStoreBuilder`]. Call
/// [`max_entries()`](MokaStoreBuilder::max_entries) before `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Builder for creating and configuring a [`MokaStore`].
///
/// Use [`MokaStore::builder`] to create a new builder instance. `build()` is
/// only available once a capacity is set.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use recache_moka::MokaStore;
///
/// let store = MokaStore::<String>::builder()
///     .max_entries(10)
///     .time_to_live(Duration::from_secs(1))
///     .label("throttle")
///     .build();
/// ```
pub struct MokaStoreBuilder<V, Cap = NoCapacity> {
    capacity: Cap,
    time_to_live: Option<Duration>,
    label: SmolStr,
    eviction_policy: Option<EvictionPolicy>,
    _value: PhantomData<fn() -> V>,
}

impl<V> MokaStoreBuilder<V, NoCapacity> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            time_to_live: None,
            label: SmolStr::new_static("moka"),
            eviction_policy: None,
            _value: PhantomData,
        }
    }

    /// Sets the maximum number of entries the store can hold.
    ///
    /// When the store exceeds this capacity, entries are evicted according to
    /// the eviction policy.
    pub fn max_entries(self, capacity: u64) -> MokaStoreBuilder<V, EntryCapacity> {
        MokaStoreBuilder {
            capacity: EntryCapacity(capacity),
            time_to_live: self.time_to_live,
            label: self.label,
            eviction_policy: self.eviction_policy,
            _value: PhantomData,
        }
    }
}

impl<V> Default for MokaStoreBuilder<V, NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, Cap> MokaStoreBuilder<V, Cap> {
    /// Expires every entry this long after it was written.
    ///
    /// # Default
    ///
    /// No expiry: entries live until evicted.
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Sets a label used in metrics and debug output.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<SmolStr>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the eviction policy.
    ///
    /// # Default
    ///
    /// [`EvictionPolicy::lru()`]. Least recently used entries go first.
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }
}

impl<V> MokaStoreBuilder<V, EntryCapacity>
where
    V: Clone + Send + Sync + 'static,
{
    /// Builds the [`MokaStore`].
    pub fn build(self) -> MokaStore<V> {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let mut builder = CacheBuilder::new(self.capacity.0).eviction_policy(policy);
        if let Some(ttl) = self.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        MokaStore {
            cache: builder.build(),
            label: self.label,
        }
    }
}
