//! Throttle enhancer.
//!
//! Identical `GET`s issued within `threshold` of each other share one
//! transport call. Other methods pass through untouched.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use recache_core::{CacheKey, CacheLike, Handle, Request, SharedStore, Transport, into_handle};
use recache_moka::MokaStore;
use tokio::time::Instant;
use tower::Layer;
use tracing::{debug, warn};

use crate::config::ThrottleSettings;
use crate::metrics;

/// A recorded call: when it was issued (or completed) and its result.
pub struct ThrottleRecord<R, E> {
    /// Issue time, replaced by the completion time once the call succeeds.
    pub timestamp: Instant,
    /// Result of the call.
    pub handle: Handle<R, E>,
}

impl<R, E> Clone for ThrottleRecord<R, E> {
    fn clone(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            handle: self.handle.clone(),
        }
    }
}

impl<R, E> std::fmt::Debug for ThrottleRecord<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleRecord")
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

type RecordStore<R, E> = SharedStore<ThrottleRecord<R, E>>;

/// [`Layer`] that de-duplicates `GET`s within a time window.
pub struct ThrottleLayer<R, E> {
    threshold: Duration,
    store: RecordStore<R, E>,
}

impl<R, E> Clone for ThrottleLayer<R, E> {
    fn clone(&self) -> Self {
        Self {
            threshold: self.threshold,
            store: self.store.clone(),
        }
    }
}

impl<R, E> std::fmt::Debug for ThrottleLayer<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleLayer")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl<R, E> ThrottleLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// One second window, ten records.
    pub fn new() -> Self {
        Self::from_section(&ThrottleSettings::default())
    }

    /// Creates a layer from the `throttle` section of the settings.
    pub fn from_section(settings: &ThrottleSettings) -> Self {
        Self {
            threshold: settings.threshold,
            store: Arc::new(MokaStore::new(settings.max_entries)),
        }
    }

    /// Sets the window.
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replaces the record store.
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: CacheLike<ThrottleRecord<R, E>> + 'static,
    {
        self.store = Arc::new(store);
        self
    }
}

impl<R, E> Default for ThrottleLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Layer<T> for ThrottleLayer<T::Response, T::Error>
where
    T: Transport,
{
    type Service = ThrottleTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        ThrottleTransport {
            inner,
            threshold: self.threshold,
            store: self.store.clone(),
        }
    }
}

/// Transport produced by [`ThrottleLayer`].
pub struct ThrottleTransport<T: Transport> {
    inner: T,
    threshold: Duration,
    store: RecordStore<T::Response, T::Error>,
}

impl<T: Transport> Clone for ThrottleTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            threshold: self.threshold,
            store: self.store.clone(),
        }
    }
}

impl<T: Transport> ThrottleTransport<T> {
    fn record(&self, request: Request, key: CacheKey) -> Handle<T::Response, T::Error> {
        let call = self.inner.call(request);
        let store = self.store.clone();
        let record_key = key.clone();

        let handle = into_handle(async move {
            let result = call.await;
            match &result {
                Ok(response) => store.set(
                    &record_key,
                    ThrottleRecord {
                        timestamp: Instant::now(),
                        handle: future::ready(Ok(response.clone())).boxed().shared(),
                    },
                ),
                Err(_) => store.remove(&record_key),
            }
            result
        });

        self.store.set(
            &key,
            ThrottleRecord {
                timestamp: Instant::now(),
                handle: handle.clone(),
            },
        );
        handle
    }
}

impl<T: Transport> Transport for ThrottleTransport<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<Self::Response, Self::Error>> {
        if !request.is_read() {
            return self.inner.call(request);
        }

        let key = match CacheKey::from_request(&request, false) {
            Ok(key) => key,
            Err(error) => {
                warn!(%error, url = request.url(), "cannot build throttle key, passing through");
                return self.inner.call(request);
            }
        };

        let now = Instant::now();
        if let Some(record) = self.store.get(&key) {
            if now.saturating_duration_since(record.timestamp) <= self.threshold {
                debug!(key = %key, "throttled");
                metrics::record_throttle_hit();
                return record.handle.boxed();
            }
        }

        debug!(key = %key, "throttle window open, calling");
        self.record(request, key).boxed()
    }
}
