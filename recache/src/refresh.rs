//! Background revalidation runner.
//!
//! The SWR enhancer answers a stale hit with the stored handle and leaves the
//! refresh to a [`Refresher`], which drives it on the tokio runtime. Each
//! running refresh is registered under a [`RefreshKey`]: the entry's cache
//! key together with the identity of the store holding it. A stale hit whose
//! entry is already being refreshed does not start a second refresh.
//!
//! ```
//! use recache::refresh::{RefreshKey, Refresher};
//! use recache::{CacheKey, MapStore, SharedStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let refresher = Refresher::default();
//! let store: SharedStore<u32> = Arc::new(MapStore::new());
//! let key = RefreshKey::new(&store, &CacheKey::from("/users"));
//!
//! assert!(refresher.start(key.clone(), || async {}));
//! refresher.wait_all().await;
//! assert!(!refresher.is_running(&key));
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use recache_core::CacheKey;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

use crate::config::{RefreshSettings, RefreshTimeout};
use crate::metrics;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Identity of one refreshable entry: which store, which key.
///
/// Stores are told apart by their allocation, so a store handed in per
/// request should be the same `Arc` across requests to share refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefreshKey {
    store: usize,
    key: CacheKey,
}

impl RefreshKey {
    /// Key of `key` held in `store`.
    pub fn new<S: ?Sized>(store: &Arc<S>, key: &CacheKey) -> Self {
        Self {
            store: Arc::as_ptr(store).cast::<()>() as usize,
            key: key.clone(),
        }
    }

    /// The entry's cache key.
    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }
}

#[derive(Debug)]
struct Running {
    task: JoinHandle<()>,
    generation: u64,
}

#[derive(Debug)]
struct Registry {
    settings: RefreshSettings,
    running: DashMap<RefreshKey, Running>,
    generation: AtomicU64,
}

/// Runs background revalidations.
///
/// Clones share the registry of running refreshes.
#[derive(Clone, Debug)]
pub struct Refresher {
    inner: Arc<Registry>,
}

impl Refresher {
    /// Creates a runner with its own empty registry.
    pub fn new(settings: RefreshSettings) -> Self {
        Self {
            inner: Arc::new(Registry {
                settings,
                running: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the settings.
    pub fn settings(&self) -> &RefreshSettings {
        &self.inner.settings
    }

    /// Starts the refresh built by `refresh` unless one for `key` is
    /// already running and duplicates are skipped.
    ///
    /// `refresh` is only called when the refresh actually starts, so any
    /// bookkeeping it does (storing the new handle) is skipped along with it.
    pub fn start<F, Fut>(&self, key: RefreshKey, refresh: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.inner.settings.deduplicate && self.is_running(&key) {
            debug!(key = %key.key, "revalidation already running");
            metrics::record_revalidation_skipped();
            return false;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let span = info_span!("revalidation", key = %key.key);
        let task = tokio::spawn(
            supervise(self.inner.clone(), key.clone(), generation, refresh()).instrument(span),
        );
        self.inner.running.insert(key, Running { task, generation });
        true
    }

    /// `true` while a refresh of `key` runs.
    pub fn is_running(&self, key: &RefreshKey) -> bool {
        self.inner
            .running
            .get(key)
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Number of refreshes currently running.
    pub fn running(&self) -> usize {
        self.inner
            .running
            .iter()
            .filter(|running| !running.task.is_finished())
            .count()
    }

    /// Resolves once no refresh is running, including refreshes started
    /// while waiting.
    ///
    /// Polls with a short sleep so a paused test clock can auto-advance.
    pub async fn wait_all(&self) {
        loop {
            self.inner
                .running
                .retain(|_, running| !running.task.is_finished());
            if self.inner.running.is_empty() {
                break;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

impl Default for Refresher {
    fn default() -> Self {
        Self::new(RefreshSettings::default())
    }
}

async fn supervise<F>(registry: Arc<Registry>, key: RefreshKey, generation: u64, refresh: F)
where
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let timed_out = match registry.settings.timeout {
        RefreshTimeout::Unbounded => {
            refresh.await;
            false
        }
        RefreshTimeout::Cancel { after } => tokio::time::timeout(after, refresh).await.is_err(),
        RefreshTimeout::Warn { after } => {
            refresh.await;
            let elapsed = started.elapsed();
            if elapsed > after {
                warn!(
                    key = %key.key,
                    elapsed_ms = elapsed.as_millis(),
                    budget_ms = after.as_millis(),
                    "revalidation exceeded its time budget"
                );
            }
            false
        }
    };
    if timed_out {
        warn!(key = %key.key, "revalidation dropped after timeout");
    }
    metrics::record_revalidation_finished(started.elapsed(), timed_out);

    // A newer refresh may own the slot already.
    registry
        .running
        .remove_if(&key, |_, running| running.generation == generation);
}
