//! Stale-while-revalidate enhancer.
//!
//! Works like the plain cache, but a hit on a stale entry also starts a
//! background refresh. The caller gets the stored result right away while
//! the refresh replaces the stored handle. Freshness is tracked per key in a
//! separate store of expiry instants:
//!
//! ```text
//! absent -> pending -> fresh(expiry) -> stale -> revalidating -> fresh | absent
//! ```
//!
//! With [`Revalidate::Always`] no expiry is recorded, so every hit on a
//! resolved entry refreshes it. A `forceRevalidate` request refreshes even
//! a pending entry.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use http::Method;
use recache_core::{
    CacheKey, CacheLike, Handle, OptionValue, Request, SharedStore, Transport, into_handle,
};
use smol_str::SmolStr;
use tokio::time::Instant;
use tower::Layer;
use tracing::{debug, warn};

use crate::cache::default_store;
use crate::config::{ConfigError, SwrSettings};
use crate::metrics::{self, Decision};
use crate::refresh::{RefreshKey, Refresher};
use crate::policy::{CachePolicy, store_override};

const ENHANCER: &str = "swr";

/// When hits on a resolved entry trigger a background refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Revalidate {
    /// Never. Behaves like the plain cache.
    Disabled,
    /// On every hit.
    #[default]
    Always,
    /// On hits at or after the given time since the last successful call.
    Window(Duration),
}

impl Revalidate {
    fn from_settings(settings: &SwrSettings) -> Self {
        if !settings.revalidate {
            return Self::Disabled;
        }
        match settings.keep_alive {
            Some(window) if !window.is_zero() => Self::Window(window),
            _ => Self::Always,
        }
    }

    /// Expiry to record after a successful call at `now`.
    fn expiry(self, now: Instant) -> Option<Instant> {
        match self {
            Self::Window(window) => Some(now + window),
            Self::Disabled | Self::Always => None,
        }
    }
}

#[derive(Debug, Clone)]
struct SwrFlags {
    revalidate: SmolStr,
    keep_alive: SmolStr,
    force_revalidate: SmolStr,
    freshness: SmolStr,
}

impl SwrFlags {
    fn from_settings(settings: &SwrSettings) -> Self {
        Self {
            revalidate: settings.revalidate_flag.clone(),
            keep_alive: settings.keep_alive_flag.clone(),
            force_revalidate: settings.force_revalidate_flag.clone(),
            freshness: settings.freshness_flag.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct SwrPolicy {
    cache: CachePolicy,
    flags: SwrFlags,
    revalidate: Revalidate,
}

impl SwrPolicy {
    /// `staleWhileRevalidate` may switch revalidation off (`false`, `0`) or
    /// set the window (milliseconds). `keepAlive > 0` sets the window of an
    /// enabled revalidation.
    fn revalidate(&self, request: &Request) -> Revalidate {
        let base = match request.option(&self.flags.revalidate) {
            None => self.revalidate,
            Some(OptionValue::Number(0)) => Revalidate::Disabled,
            Some(OptionValue::Number(ms)) => Revalidate::Window(Duration::from_millis(*ms)),
            Some(value) if value.is_truthy() => match self.revalidate {
                Revalidate::Disabled => Revalidate::Always,
                other => other,
            },
            Some(_) => Revalidate::Disabled,
        };
        if base == Revalidate::Disabled {
            return base;
        }
        match request
            .option(&self.flags.keep_alive)
            .and_then(OptionValue::as_number)
        {
            Some(ms) if ms > 0 => Revalidate::Window(Duration::from_millis(ms)),
            _ => base,
        }
    }
}

/// Stale entries are those without a recorded expiry or past it.
fn is_stale(expiry: Option<Instant>, now: Instant) -> bool {
    expiry.is_none_or(|expiry| now >= expiry)
}

/// [`Layer`] that adds stale-while-revalidate caching to a transport.
///
/// Refreshes run on the tokio runtime through a [`Refresher`], which also
/// makes sure only one refresh per stored entry runs at a time.
pub struct SwrLayer<R, E> {
    policy: SwrPolicy,
    store: SharedStore<Handle<R, E>>,
    freshness: SharedStore<Instant>,
    refresher: Refresher,
}

impl<R, E> Clone for SwrLayer<R, E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            store: self.store.clone(),
            freshness: self.freshness.clone(),
            refresher: self.refresher.clone(),
        }
    }
}

impl<R, E> std::fmt::Debug for SwrLayer<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwrLayer")
            .field("policy", &self.policy)
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}

impl<R, E> SwrLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a layer with default settings, default stores and its own
    /// refresher.
    pub fn new() -> Self {
        let settings = SwrSettings::default();
        Self {
            policy: SwrPolicy {
                cache: CachePolicy::default(),
                flags: SwrFlags::from_settings(&settings),
                revalidate: Revalidate::from_settings(&settings),
            },
            store: default_store(&settings.cache),
            freshness: default_store(&settings.cache),
            refresher: Refresher::default(),
        }
    }

    /// Creates a layer from the `swr` section of the settings.
    pub fn from_section(settings: &SwrSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: SwrPolicy {
                cache: CachePolicy::from_settings(&settings.cache)?,
                flags: SwrFlags::from_settings(settings),
                revalidate: Revalidate::from_settings(settings),
            },
            store: default_store(&settings.cache),
            freshness: default_store(&settings.cache),
            refresher: Refresher::new(settings.refresh),
        })
    }

    /// Caches requests without the cache flag (`true` by default).
    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.policy.cache.enabled_by_default = enabled;
        self
    }

    /// Renames the per-request cache flag (`"cache"` by default).
    pub fn cache_flag(mut self, flag: impl Into<SmolStr>) -> Self {
        self.policy.cache.cache_flag = flag.into();
        self
    }

    /// Sets the cacheable methods (`GET` only by default).
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.policy.cache.methods = methods.into_iter().collect();
        self
    }

    /// Sets the default revalidation mode ([`Revalidate::Always`] by default).
    pub fn revalidate(mut self, revalidate: Revalidate) -> Self {
        self.policy.revalidate = revalidate;
        self
    }

    /// Replaces the default handle store.
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: CacheLike<Handle<R, E>> + 'static,
    {
        self.store = Arc::new(store);
        self
    }

    /// Replaces the default freshness store.
    pub fn freshness_store<S>(mut self, store: S) -> Self
    where
        S: CacheLike<Instant> + 'static,
    {
        self.freshness = Arc::new(store);
        self
    }

    /// Runs refreshes on the given refresher, e.g. one shared by several
    /// layers.
    pub fn with_refresher(mut self, refresher: Refresher) -> Self {
        self.refresher = refresher;
        self
    }

    /// Returns the runner of background refreshes.
    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }
}

impl<R, E> Default for SwrLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Layer<T> for SwrLayer<T::Response, T::Error>
where
    T: Transport,
{
    type Service = SwrTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        SwrTransport {
            inner,
            policy: Arc::new(self.policy.clone()),
            store: self.store.clone(),
            freshness: self.freshness.clone(),
            refresher: self.refresher.clone(),
        }
    }
}

/// Transport produced by [`SwrLayer`].
pub struct SwrTransport<T: Transport> {
    inner: T,
    policy: Arc<SwrPolicy>,
    store: SharedStore<Handle<T::Response, T::Error>>,
    freshness: SharedStore<Instant>,
    refresher: Refresher,
}

impl<T: Transport> Clone for SwrTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            policy: self.policy.clone(),
            store: self.store.clone(),
            freshness: self.freshness.clone(),
            refresher: self.refresher.clone(),
        }
    }
}

struct Entry<R, E> {
    key: CacheKey,
    store: SharedStore<Handle<R, E>>,
    freshness: SharedStore<Instant>,
    revalidate: Revalidate,
}

impl<T: Transport> SwrTransport<T> {
    /// Wraps a call so that its outcome updates both stores.
    fn track(
        &self,
        request: Request,
        entry: &Entry<T::Response, T::Error>,
        refresh: bool,
    ) -> Handle<T::Response, T::Error> {
        let call = self.inner.call(request);
        let key = entry.key.clone();
        let store = entry.store.clone();
        let freshness = entry.freshness.clone();
        let revalidate = entry.revalidate;

        into_handle(async move {
            let result = call.await;
            match &result {
                Ok(_) => match revalidate.expiry(Instant::now()) {
                    Some(expiry) => freshness.set(&key, expiry),
                    None => freshness.remove(&key),
                },
                Err(_) => {
                    store.remove(&key);
                    freshness.remove(&key);
                    metrics::record_eviction(ENHANCER);
                    if refresh {
                        warn!(key = %key, "revalidation failed, entry evicted");
                        metrics::record_revalidation_failed();
                    } else {
                        debug!(key = %key, "call failed, evicting");
                    }
                }
            }
            result
        })
    }

    fn start_refresh(&self, request: Request, entry: &Entry<T::Response, T::Error>) {
        let key = RefreshKey::new(&entry.store, &entry.key);
        self.refresher.start(key, || {
            let handle = self.track(request, entry, true);
            entry.store.set(&entry.key, handle.clone());
            debug!(key = %entry.key, "revalidating in background");
            metrics::record_revalidation_started();
            handle.map(drop)
        });
    }
}

impl<T: Transport> Transport for SwrTransport<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<Self::Response, Self::Error>> {
        let policy = &self.policy;
        if !policy.cache.use_cache(&request) {
            debug!(method = %request.method(), url = request.url(), "cache bypass");
            metrics::record_decision(ENHANCER, Decision::Bypass);
            return self.inner.call(request);
        }

        let key = match policy.cache.key(&request) {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, url = request.url(), "cannot build cache key, bypassing cache");
                metrics::record_decision(ENHANCER, Decision::Bypass);
                return self.inner.call(request);
            }
        };

        let entry = Entry {
            store: policy.cache.store(&request, &self.store),
            freshness: store_override(&request, &policy.flags.freshness)
                .unwrap_or_else(|| self.freshness.clone()),
            revalidate: policy.revalidate(&request),
            key,
        };

        if !policy.cache.force_update(&request) {
            if let Some(handle) = entry.store.get(&entry.key) {
                debug!(key = %entry.key, "cache hit");
                metrics::record_decision(ENHANCER, Decision::Hit);

                // A pending handle is already the freshest result there is,
                // unless the caller forces a refresh.
                let forced = request.flag(&policy.flags.force_revalidate);
                let wanted = forced
                    || (handle.peek().is_some()
                        && is_stale(entry.freshness.get(&entry.key), Instant::now()));
                if entry.revalidate != Revalidate::Disabled && wanted {
                    self.start_refresh(request, &entry);
                }
                return handle.boxed();
            }
        }

        debug!(key = %entry.key, "cache miss");
        metrics::record_decision(ENHANCER, Decision::Miss);
        let handle = self.track(request, &entry, false);
        entry.store.set(&entry.key, handle.clone());
        handle.boxed()
    }
}
