//! Plain cache enhancer.
//!
//! Stores the [`Handle`] of the first call for a key and hands it to every
//! later identical request, so concurrent duplicates share one transport
//! call and later ones resolve immediately. A failed call evicts its key.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use http::Method;
use recache_core::{
    CacheKey, CacheLike, Handle, Request, SharedStore, Transport, into_handle,
};
use recache_moka::MokaStore;
use smol_str::SmolStr;
use tower::Layer;
use tracing::{debug, warn};

use crate::config::{CacheSettings, ConfigError};
use crate::metrics::{self, Decision};
use crate::policy::CachePolicy;

const ENHANCER: &str = "cache";

/// Default store of the cache enhancers: 100 entries, five minute TTL.
pub(crate) fn default_store<V>(settings: &CacheSettings) -> SharedStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    let builder = MokaStore::builder().max_entries(settings.max_entries);
    let builder = match settings.ttl {
        Some(ttl) => builder.time_to_live(ttl),
        None => builder,
    };
    Arc::new(builder.build())
}

/// Issues the call, stores its handle under `key` before returning it and
/// evicts the key if the call fails.
pub(crate) fn fill<R, E>(
    call: BoxFuture<'static, Result<R, E>>,
    key: CacheKey,
    store: SharedStore<Handle<R, E>>,
    enhancer: &'static str,
) -> Handle<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let evict_key = key.clone();
    let evict_store = store.clone();
    let handle = into_handle(async move {
        let result = call.await;
        if result.is_err() {
            debug!(key = %evict_key, "call failed, evicting");
            evict_store.remove(&evict_key);
            metrics::record_eviction(enhancer);
        }
        result
    });
    store.set(&key, handle.clone());
    handle
}

/// [`Layer`] that adds response caching to a transport.
///
/// # Example
///
/// ```
/// use http::Method;
/// use recache::CacheLayer;
/// use recache_core::{Request, Transport, transport_fn};
/// use tower::Layer;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = transport_fn(|req: Request| async move {
///     Ok::<_, String>(req.url().to_owned())
/// });
/// let cached = CacheLayer::new()
///     .methods([Method::GET, Method::POST])
///     .layer(transport);
///
/// assert_eq!(cached.call(Request::get("/users")).await, Ok("/users".to_owned()));
/// # }
/// ```
pub struct CacheLayer<R, E> {
    policy: CachePolicy,
    store: SharedStore<Handle<R, E>>,
}

impl<R, E> Clone for CacheLayer<R, E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            store: self.store.clone(),
        }
    }
}

impl<R, E> std::fmt::Debug for CacheLayer<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<R, E> CacheLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a layer with default settings and its own default store.
    pub fn new() -> Self {
        let settings = CacheSettings::default();
        Self {
            policy: CachePolicy::default(),
            store: default_store(&settings),
        }
    }

    /// Creates a layer from the `cache` section of the settings.
    pub fn from_section(settings: &CacheSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: CachePolicy::from_settings(settings)?,
            store: default_store(settings),
        })
    }

    /// Caches requests without the cache flag (`true` by default).
    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.policy.enabled_by_default = enabled;
        self
    }

    /// Renames the per-request cache flag (`"cache"` by default).
    pub fn cache_flag(mut self, flag: impl Into<SmolStr>) -> Self {
        self.policy.cache_flag = flag.into();
        self
    }

    /// Renames the per-request force-update flag (`"forceUpdate"` by default).
    pub fn force_update_flag(mut self, flag: impl Into<SmolStr>) -> Self {
        self.policy.force_update_flag = flag.into();
        self
    }

    /// Sets the cacheable methods (`GET` only by default).
    ///
    /// The body of non-`GET` requests becomes part of the key.
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.policy.methods = methods.into_iter().collect();
        self
    }

    /// Replaces the default store.
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: CacheLike<Handle<R, E>> + 'static,
    {
        self.store = Arc::new(store);
        self
    }

    /// Returns the default store.
    pub fn default_store(&self) -> &SharedStore<Handle<R, E>> {
        &self.store
    }
}

impl<R, E> Default for CacheLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Layer<T> for CacheLayer<T::Response, T::Error>
where
    T: Transport,
{
    type Service = CacheTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        CacheTransport {
            inner,
            policy: Arc::new(self.policy.clone()),
            store: self.store.clone(),
        }
    }
}

/// Transport produced by [`CacheLayer`].
pub struct CacheTransport<T: Transport> {
    inner: T,
    policy: Arc<CachePolicy>,
    store: SharedStore<Handle<T::Response, T::Error>>,
}

impl<T: Transport> Clone for CacheTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            policy: self.policy.clone(),
            store: self.store.clone(),
        }
    }
}

impl<T: Transport> CacheTransport<T> {
    /// Returns the wrapped transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for CacheTransport<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<Self::Response, Self::Error>> {
        if !self.policy.use_cache(&request) {
            debug!(method = %request.method(), url = request.url(), "cache bypass");
            metrics::record_decision(ENHANCER, Decision::Bypass);
            return self.inner.call(request);
        }

        let key = match self.policy.key(&request) {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, url = request.url(), "cannot build cache key, bypassing cache");
                metrics::record_decision(ENHANCER, Decision::Bypass);
                return self.inner.call(request);
            }
        };

        let store = self.policy.store(&request, &self.store);

        if !self.policy.force_update(&request) {
            if let Some(handle) = store.get(&key) {
                debug!(key = %key, "cache hit");
                metrics::record_decision(ENHANCER, Decision::Hit);
                return handle.boxed();
            }
        }

        debug!(key = %key, "cache miss");
        metrics::record_decision(ENHANCER, Decision::Miss);
        fill(self.inner.call(request), key, store, ENHANCER).boxed()
    }
}
