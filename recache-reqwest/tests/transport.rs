//! Integration tests for ReqwestTransport using wiremock.

use futures::future::join_all;
use http::StatusCode;
use recache::{CacheLayer, Request, RetryLayer, Transport, compose};
use recache_reqwest::{ReqwestTransport, TransportError};
use serde_json::json;
use tower::Layer;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> ReqwestTransport {
    ReqwestTransport::new(reqwest::Client::new()).base_url(server.uri().parse().unwrap())
}

#[tokio::test]
async fn test_cached_get_hits_server_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": ["ferris"]})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CacheLayer::new().layer(transport(&mock_server));
    let request = || Request::get("/users").with_param("page", 2);

    let responses = join_all((0..5).map(|_| client.call(request()))).await;
    for response in responses {
        let response = response.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json::<serde_json::Value>().unwrap()["users"][0], "ferris");
    }

    client.call(request()).await.unwrap();
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"q": "rust"})))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = transport(&mock_server)
        .call(Request::post("/search").with_body(json!({"q": "rust"})))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.text(), "created");
}

#[tokio::test]
async fn test_error_status_is_retried_and_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;

    let client = compose![CacheLayer::new(), RetryLayer::new().times(1)]
        .layer(transport(&mock_server));

    for _ in 0..2 {
        let error = client.call(Request::get("/flaky")).await.unwrap_err();
        match error {
            TransportError::Status(response) => {
                assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[tokio::test]
async fn test_relative_url_without_base_is_rejected() {
    let transport = ReqwestTransport::new(reqwest::Client::new());

    let error = transport.call(Request::get("/users")).await.unwrap_err();

    assert!(matches!(error, TransportError::InvalidUrl(_)));
}
