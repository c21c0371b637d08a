mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockTransport, init_tracing};
use futures::future::{BoxFuture, join_all};
use recache::config::{RefreshTimeout, Settings};
use recache::{
    AdapterBuilder, CacheLayer, Request, RetryLayer, SwrLayer, ThrottleLayer, Transport, compose,
};
use tower::Layer;

/// Records the order in which requests pass through it.
#[derive(Clone)]
struct Tag {
    name: &'static str,
    seen: Arc<Mutex<Vec<&'static str>>>,
}

#[derive(Clone)]
struct Tagged<T> {
    inner: T,
    tag: Tag,
}

impl<T: Transport> Layer<T> for Tag {
    type Service = Tagged<T>;

    fn layer(&self, inner: T) -> Self::Service {
        Tagged {
            inner,
            tag: self.clone(),
        }
    }
}

impl<T: Transport> Transport for Tagged<T> {
    type Response = T::Response;
    type Error = T::Error;

    fn call(&self, request: Request) -> BoxFuture<'static, Result<T::Response, T::Error>> {
        self.tag.seen.lock().unwrap().push(self.tag.name);
        self.inner.call(request)
    }
}

fn tags() -> (Tag, Tag, Arc<Mutex<Vec<&'static str>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let a = Tag {
        name: "a",
        seen: seen.clone(),
    };
    let b = Tag {
        name: "b",
        seen: seen.clone(),
    };
    (a, b, seen)
}

#[tokio::test(start_paused = true)]
async fn test_last_layer_is_outermost() {
    let (a, b, seen) = tags();
    let client = compose![a, b].layer(MockTransport::new());

    client.call(Request::get("/users")).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["b", "a"]);
}

#[tokio::test(start_paused = true)]
async fn test_builder_matches_macro_order() {
    let (a, b, seen) = tags();
    let client = AdapterBuilder::new(MockTransport::new())
        .enhance(a)
        .enhance(b)
        .build();

    client.call(Request::get("/users")).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["b", "a"]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_over_cache_recovers_evicted_failure() {
    init_tracing();
    let transport = MockTransport::new();
    transport.fail_next(1);
    let client = compose![CacheLayer::new(), RetryLayer::new()].layer(transport.clone());

    let response = client.call(Request::get("/users")).await.unwrap();
    assert_eq!(response.call, 2);

    client.call(Request::get("/users")).await.unwrap();
    assert_eq!(transport.calls(), 2, "recovered response is cached");
}

#[tokio::test(start_paused = true)]
async fn test_full_chain_coalesces() {
    let transport = MockTransport::new();
    let client = compose![
        CacheLayer::new(),
        ThrottleLayer::new(),
        RetryLayer::new().times(1),
    ]
    .layer(transport.clone());

    let responses = join_all((0..5).map(|_| client.call(Request::get("/users")))).await;

    assert!(responses.iter().all(|r| r.as_ref().unwrap().call == 1));
    assert_eq!(transport.calls(), 1);
}

#[test]
fn test_settings_from_yaml() {
    let yaml = r#"
cache:
  methods: [get, post]
  ttl: 10s
swr:
  keep_alive: 250ms
  refresh:
    deduplicate: false
    timeout:
      type: Cancel
      after: 5s
throttle:
  threshold: 2s
retry:
  times: 4
"#;

    let settings: Settings = serde_saphyr::from_str(yaml).unwrap();

    assert_eq!(settings.cache.methods, vec!["get", "post"]);
    assert_eq!(settings.cache.ttl, Some(Duration::from_secs(10)));
    assert_eq!(settings.swr.keep_alive, Some(Duration::from_millis(250)));
    assert!(settings.swr.revalidate);
    assert_eq!(settings.throttle.threshold, Duration::from_secs(2));
    assert_eq!(settings.retry.times, 4);
    assert!(!settings.swr.refresh.deduplicate);
    assert_eq!(
        settings.swr.refresh.timeout,
        RefreshTimeout::Cancel {
            after: Duration::from_secs(5)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_chain_from_settings() {
    let yaml = r#"
retry:
  times: 3
swr:
  keep_alive: 1s
"#;
    let settings: Settings = serde_saphyr::from_str(yaml).unwrap();
    let transport = MockTransport::new();

    let client = AdapterBuilder::new(transport.clone())
        .enhance_from::<SwrLayer<_, _>>(&settings)
        .unwrap()
        .enhance_from::<RetryLayer>(&settings)
        .unwrap()
        .build();

    client.call(Request::get("/users")).await.unwrap();
    client.call(Request::get("/users")).await.unwrap();
    assert_eq!(transport.calls(), 1, "fresh within the keep-alive window");

    transport.set_failing(true);
    let error = client
        .call(Request::get("/teams"))
        .await
        .unwrap_err();
    assert_eq!(error.call, 5, "three retries after the first attempt");
}

#[test]
fn test_invalid_method_is_rejected() {
    let settings: Settings = serde_saphyr::from_str("cache:\n  methods: [\"GE T\"]\n").unwrap();

    let result = CacheLayer::<(), ()>::from_section(&settings.cache);

    assert!(result.is_err());
}
