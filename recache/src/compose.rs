//! Composition of enhancers.
//!
//! Enhancers are tower [`Layer`]s over a [`Transport`]. They compose left to
//! right: the first one listed wraps the base transport, the last one is
//! outermost and sees requests first.
//!
//! ```
//! use recache::{CacheLayer, RetryLayer, ThrottleLayer, compose};
//! use recache_core::{Request, Transport, transport_fn};
//! use tower::Layer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = transport_fn(|req: Request| async move {
//!     Ok::<_, String>(req.url().to_owned())
//! });
//!
//! // retry(throttle(cache(transport)))
//! let client = compose![CacheLayer::new(), ThrottleLayer::new(), RetryLayer::new()]
//!     .layer(transport);
//!
//! assert_eq!(client.call(Request::get("/users")).await, Ok("/users".to_owned()));
//! # }
//! ```

pub use tower::layer::util::Stack;
use tower::Layer;

use recache_core::Transport;

use crate::cache::CacheLayer;
use crate::config::{ConfigError, Settings};
use crate::retry::RetryLayer;
use crate::swr::SwrLayer;
use crate::throttle::ThrottleLayer;

/// Folds enhancer layers left to right into one [`Layer`].
///
/// `compose![a, b, c]` is `Stack::new(Stack::new(a, b), c)`: `a` wraps the
/// transport, `c` is outermost.
#[macro_export]
macro_rules! compose {
    ($first:expr $(, $rest:expr)* $(,)?) => {{
        let layer = $first;
        $(
            let layer = $crate::compose::Stack::new(layer, $rest);
        )*
        layer
    }};
}

/// Enhancer layers that can be built from the shared [`Settings`].
///
/// Each implementation reads only its own section.
pub trait FromSettings: Sized {
    /// Builds the layer.
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError>;
}

impl<R, E> FromSettings for CacheLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        CacheLayer::from_section(&settings.cache)
    }
}

impl<R, E> FromSettings for SwrLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        SwrLayer::from_section(&settings.swr)
    }
}

impl<R, E> FromSettings for ThrottleLayer<R, E>
where
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(ThrottleLayer::from_section(&settings.throttle))
    }
}

impl FromSettings for RetryLayer {
    fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(RetryLayer::from_section(&settings.retry))
    }
}

/// Step-by-step counterpart of [`compose!`].
///
/// ```
/// use recache::{AdapterBuilder, CacheLayer, RetryLayer};
/// use recache::config::Settings;
/// use recache_core::{Request, Transport, transport_fn};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), recache::config::ConfigError> {
/// let transport = transport_fn(|req: Request| async move {
///     Ok::<_, String>(req.url().len())
/// });
///
/// let client = AdapterBuilder::new(transport)
///     .enhance_from::<CacheLayer<_, _>>(&Settings::default())?
///     .enhance(RetryLayer::new().times(3))
///     .build();
///
/// assert_eq!(client.call(Request::get("/users")).await, Ok(6));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdapterBuilder<T> {
    transport: T,
}

impl<T: Transport> AdapterBuilder<T> {
    /// Starts from the base transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Wraps the current transport with `layer`.
    pub fn enhance<L>(self, layer: L) -> AdapterBuilder<L::Service>
    where
        L: Layer<T>,
        L::Service: Transport,
    {
        AdapterBuilder {
            transport: layer.layer(self.transport),
        }
    }

    /// Builds `L` from the settings and wraps the current transport with it.
    pub fn enhance_from<L>(self, settings: &Settings) -> Result<AdapterBuilder<L::Service>, ConfigError>
    where
        L: FromSettings + Layer<T>,
        L::Service: Transport,
    {
        Ok(self.enhance(L::from_settings(settings)?))
    }

    /// Returns the enhanced transport.
    pub fn build(self) -> T {
        self.transport
    }
}
