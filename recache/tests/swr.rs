mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockError, MockResponse, MockTransport, init_tracing};
use futures::future::{join, join_all};
use recache::{
    Handle, MapStore, OptionValue, Request, Revalidate, SharedStore, SwrLayer, Transport,
};
use tokio::time::Instant;
use tower::Layer;

#[tokio::test(start_paused = true)]
async fn test_every_hit_revalidates_by_default() {
    init_tracing();
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());

    for i in 0..5 {
        let response = client.call(Request::get("/users")).await.unwrap();
        // Each hit serves the result of the previous refresh.
        assert_eq!(response.call, i.max(1));
        layer.refresher().wait_all().await;
    }

    assert_eq!(transport.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_misses_share_one_call() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());

    let responses = join_all((0..5).map(|_| client.call(Request::get("/users")))).await;
    layer.refresher().wait_all().await;

    assert!(responses.iter().all(|r| r.as_ref().unwrap().call == 1));
    assert_eq!(transport.calls(), 1, "pending entries are never revalidated");
}

#[tokio::test(start_paused = true)]
async fn test_disabled_behaves_like_plain_cache() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new().revalidate(Revalidate::Disabled);
    let client = layer.layer(transport.clone());

    for _ in 0..3 {
        assert_eq!(client.call(Request::get("/users")).await.unwrap().call, 1);
    }
    layer.refresher().wait_all().await;

    assert_eq!(transport.calls(), 1);
    assert_eq!(layer.refresher().running(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_can_switch_revalidation_off() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());
    let request = || Request::get("/users").with_option("staleWhileRevalidate", false);

    for _ in 0..3 {
        client.call(request()).await.unwrap();
        layer.refresher().wait_all().await;
    }

    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_window() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new().revalidate(Revalidate::Window(Duration::from_millis(100)));
    let client = layer.layer(transport.clone());

    assert_eq!(client.call(Request::get("/users")).await.unwrap().call, 1);

    for _ in 0..3 {
        client.call(Request::get("/users")).await.unwrap();
        layer.refresher().wait_all().await;
    }
    assert_eq!(transport.calls(), 1, "fresh entries are not revalidated");

    tokio::time::advance(Duration::from_millis(50)).await;
    client.call(Request::get("/users")).await.unwrap();
    layer.refresher().wait_all().await;
    assert_eq!(transport.calls(), 1);

    tokio::time::advance(Duration::from_millis(60)).await;
    let stale = client.call(Request::get("/users")).await.unwrap();
    assert_eq!(stale.call, 1, "stale result is served right away");
    layer.refresher().wait_all().await;
    assert_eq!(transport.calls(), 2);

    // The refresh restarted the window.
    let refreshed = client.call(Request::get("/users")).await.unwrap();
    layer.refresher().wait_all().await;
    assert_eq!(refreshed.call, 2);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_option_sets_window() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());
    let request = || Request::get("/users").with_option("keepAlive", 1_000u64);

    for _ in 0..3 {
        client.call(request()).await.unwrap();
        layer.refresher().wait_all().await;
    }
    assert_eq!(transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    client.call(request()).await.unwrap();
    layer.refresher().wait_all().await;
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_force_revalidate_ignores_freshness() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new().revalidate(Revalidate::Window(Duration::from_secs(60)));
    let client = layer.layer(transport.clone());

    client.call(Request::get("/users")).await.unwrap();
    client
        .call(Request::get("/users").with_option("forceRevalidate", true))
        .await
        .unwrap();
    layer.refresher().wait_all().await;

    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_force_revalidate_while_first_call_pending() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new().revalidate(Revalidate::Window(Duration::from_secs(60)));
    let client = layer.layer(transport.clone());

    let first = client.call(Request::get("/users"));
    let forced = client.call(Request::get("/users").with_option("forceRevalidate", true));
    let (first, forced) = join(first, forced).await;
    layer.refresher().wait_all().await;

    assert_eq!(first.unwrap().call, 1);
    assert_eq!(forced.unwrap().call, 1, "forced hit still answers from the store");
    assert_eq!(transport.calls(), 2);

    let refreshed = client.call(Request::get("/users")).await.unwrap();
    assert_eq!(refreshed.call, 2);
}

#[tokio::test(start_paused = true)]
async fn test_same_key_in_two_stores_refreshes_both() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());
    let a: SharedStore<Handle<MockResponse, MockError>> = Arc::new(MapStore::new());
    let b: SharedStore<Handle<MockResponse, MockError>> = Arc::new(MapStore::new());
    let request = |store: &SharedStore<Handle<MockResponse, MockError>>| {
        Request::get("/users").with_option("cache", OptionValue::shared_store(store.clone()))
    };

    client.call(request(&a)).await.unwrap();
    client.call(request(&b)).await.unwrap();
    assert_eq!(transport.calls(), 2);

    let (from_a, from_b) = join(client.call(request(&a)), client.call(request(&b))).await;
    assert_eq!(from_a.unwrap().call, 1);
    assert_eq!(from_b.unwrap().call, 2);
    layer.refresher().wait_all().await;

    assert_eq!(transport.calls(), 4, "each store refreshes its own entry");
}

#[tokio::test(start_paused = true)]
async fn test_hits_during_refresh_share_it() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());

    client.call(Request::get("/users")).await.unwrap();

    let first = client.call(Request::get("/users"));
    let second = client.call(Request::get("/users"));
    let (first, second) = join(first, second).await;
    layer.refresher().wait_all().await;

    assert_eq!(first.unwrap().call, 1);
    assert_eq!(second.unwrap().call, 2, "second hit gets the pending refresh");
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_revalidation_evicts_entry() {
    let transport = MockTransport::new();
    let layer = SwrLayer::new();
    let client = layer.layer(transport.clone());

    client.call(Request::get("/users")).await.unwrap();

    transport.set_failing(true);
    let stale = client.call(Request::get("/users")).await;
    assert_eq!(stale.unwrap().call, 1, "stale caller is not affected");
    layer.refresher().wait_all().await;
    assert_eq!(transport.calls(), 2);

    // The failed refresh removed the entry, so this is a miss.
    let failed = client.call(Request::get("/users")).await;
    assert_eq!(failed.unwrap_err().call, 3);

    transport.set_failing(false);
    let recovered = client.call(Request::get("/users")).await;
    assert_eq!(recovered.unwrap().call, 4);
}

#[tokio::test(start_paused = true)]
async fn test_per_request_freshness_store() {
    let default_freshness = MapStore::<Instant>::new();
    let request_freshness = MapStore::<Instant>::new();
    let transport = MockTransport::new();
    let layer = SwrLayer::new()
        .revalidate(Revalidate::Window(Duration::from_secs(60)))
        .freshness_store(default_freshness.clone());
    let client = layer.layer(transport.clone());

    client
        .call(Request::get("/users").with_option(
            "freshness",
            OptionValue::store::<Instant, _>(request_freshness.clone()),
        ))
        .await
        .unwrap();

    assert_eq!(request_freshness.len(), 1);
    assert!(default_freshness.is_empty());

    client.call(Request::get("/teams")).await.unwrap();
    assert_eq!(default_freshness.len(), 1);
}
