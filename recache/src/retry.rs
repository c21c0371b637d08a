//! Retry enhancer.

use futures::future::{BoxFuture, FutureExt};
use recache_core::{OptionValue, Request, Transport};
use smol_str::SmolStr;
use tower::Layer;
use tracing::debug;

use crate::config::RetrySettings;
use crate::metrics;

/// [`Layer`] that re-issues failed calls.
///
/// A request is attempted at most `times + 1` times. The error of the last
/// attempt is returned unchanged. The per-request `retryTimes` option
/// overrides `times`.
#[derive(Debug, Clone)]
pub struct RetryLayer {
    times: u32,
    times_flag: SmolStr,
}

impl RetryLayer {
    /// Two retries, overridable per request through `retryTimes`.
    pub fn new() -> Self {
        Self::from_section(&RetrySettings::default())
    }

    /// Creates a layer from the `retry` section of the settings.
    pub fn from_section(settings: &RetrySettings) -> Self {
        Self {
            times: settings.times,
            times_flag: settings.times_flag.clone(),
        }
    }

    /// Sets the number of retries.
    pub fn times(mut self, times: u32) -> Self {
        self.times = times;
        self
    }

    /// Renames the per-request override option.
    pub fn times_flag(mut self, flag: impl Into<SmolStr>) -> Self {
        self.times_flag = flag.into();
        self
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Layer<T> for RetryLayer {
    type Service = RetryTransport<T>;

    fn layer(&self, inner: T) -> Self::Service {
        RetryTransport {
            inner,
            times: self.times,
            times_flag: self.times_flag.clone(),
        }
    }
}

/// Transport produced by [`RetryLayer`].
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    times: u32,
    times_flag: SmolStr,
}

impl<T: Transport> Transport for RetryTransport<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<Self::Response, Self::Error>> {
        let limit = request
            .option(&self.times_flag)
            .and_then(OptionValue::as_number)
            .unwrap_or(u64::from(self.times));
        let inner = self.inner.clone();

        async move {
            let mut retried = 0u64;
            loop {
                match inner.call(request.clone()).await {
                    Ok(response) => return Ok(response),
                    Err(error) if retried >= limit => return Err(error),
                    Err(_) => {
                        retried += 1;
                        debug!(url = request.url(), attempt = retried, "retrying");
                        metrics::record_retry_attempt();
                    }
                }
            }
        }
        .boxed()
    }
}
