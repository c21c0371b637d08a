#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use recache_core::{Request, Transport, build_sorted_url};

/// Delay of every mocked call.
pub const CALL_DELAY: Duration = Duration::from_millis(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub url: String,
    /// 1-based number of the transport call that produced this response.
    pub call: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockError {
    pub url: String,
    pub call: usize,
}

/// Counting transport. Fails when the request carries a truthy `error`
/// option, while `failing` is set, or for the next `fail_times` calls.
#[derive(Clone, Default)]
pub struct MockTransport {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
    fail_times: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next(&self, times: usize) {
        self.fail_times.store(times, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    type Response = MockResponse;
    type Error = MockError;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<MockResponse, MockError>> {
        let calls = self.calls.clone();
        let failing = self.failing.clone();
        let fail_times = self.fail_times.clone();

        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(CALL_DELAY).await;

            let url = build_sorted_url(request.url(), request.params(), request.serializer())
                .unwrap_or_else(|_| request.url().to_owned());
            let fail_once = fail_times
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

            if request.flag("error") || failing.load(Ordering::SeqCst) || fail_once {
                Err(MockError { url, call })
            } else {
                Ok(MockResponse { url, call })
            }
        }
        .boxed()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
