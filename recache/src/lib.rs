#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Plain cache enhancer.
///
/// [`CacheLayer`](cache::CacheLayer) coalesces identical requests onto one
/// stored [`Handle`](recache_core::Handle) and evicts it when the call fails.
pub mod cache;

/// Enhancer composition.
///
/// Provides the [`compose!`] macro, [`AdapterBuilder`](compose::AdapterBuilder)
/// and the [`FromSettings`](compose::FromSettings) trait.
pub mod compose;

/// Settings for every enhancer, loadable from YAML or JSON.
pub mod config;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Cache hits, misses, bypasses and evictions
/// - Background revalidations (started, failed, skipped, timed out, running, duration)
/// - Throttle hits and retry attempts
pub mod metrics;

mod policy;

pub mod refresh;

/// Retry enhancer.
pub mod retry;

/// Stale-while-revalidate enhancer.
pub mod swr;

/// Throttle enhancer.
pub mod throttle;

pub use cache::{CacheLayer, CacheTransport};
pub use compose::{AdapterBuilder, FromSettings};
pub use config::{ConfigError, Settings};
pub use refresh::{RefreshKey, Refresher};
pub use retry::{RetryLayer, RetryTransport};
pub use swr::{Revalidate, SwrLayer, SwrTransport};
pub use throttle::{ThrottleLayer, ThrottleRecord, ThrottleTransport};

pub use recache_core::{
    CacheKey, CacheLike, Handle, MapStore, OptionValue, Options, Request, SharedStore, Transport,
    transport_fn,
};
pub use recache_moka::MokaStore;

/// The `recache` prelude.
///
/// ```rust
/// use recache::prelude::*;
/// ```
pub mod prelude {
    pub use crate::compose;
    pub use crate::{
        AdapterBuilder, CacheLayer, FromSettings, Request, RetryLayer, SwrLayer, ThrottleLayer,
        Transport,
    };
}
