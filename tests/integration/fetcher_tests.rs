//! Detail fetching and error classification

use crate::create_test_source;
use listing_harvest::crawler::{build_http_client, DetailSource, FetchError, HttpDetailSource};
use listing_harvest::model::Identifier;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = "<html><body><h1>Flat</h1></body></html>";

fn create_source(server: &MockServer, timeout: Duration) -> HttpDetailSource {
    let config = create_test_source(&server.uri());
    let client = build_http_client(&config, timeout).unwrap();
    HttpDetailSource::new(client, &config)
}

async fn mount_page(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/v/AaB1"))
        .respond_with(ResponseTemplate::new(status).set_body_string(PAGE))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetches_markup_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/AaB1"))
        .and(header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts/AaB1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sections": []})))
        .expect(1)
        .mount(&server)
        .await;

    let source = create_source(&server, Duration::from_secs(5));
    let doc = source.fetch(&Identifier::from("AaB1")).await.unwrap();

    assert_eq!(doc.identifier, Identifier::from("AaB1"));
    assert_eq!(doc.markup.as_deref(), Some(PAGE));
    assert_eq!(doc.payload, Some(json!({"sections": []})));
    assert_eq!(doc.url, Some(format!("{}/v/AaB1", server.uri())));
}

#[tokio::test]
async fn test_page_429_is_rate_limited() {
    let server = MockServer::start().await;
    mount_page(&server, 429).await;

    let source = create_source(&server, Duration::from_secs(5));
    let result = source.fetch(&Identifier::from("AaB1")).await;
    assert_eq!(result.unwrap_err(), FetchError::RateLimited);
}

#[tokio::test]
async fn test_page_404_is_http_status() {
    let server = MockServer::start().await;
    mount_page(&server, 404).await;

    let source = create_source(&server, Duration::from_secs(5));
    let error = source.fetch(&Identifier::from("AaB1")).await.unwrap_err();
    assert_eq!(error, FetchError::HttpStatus(404));
    assert!(!error.is_transient());
}

#[tokio::test]
async fn test_page_503_is_transient() {
    let server = MockServer::start().await;
    mount_page(&server, 503).await;

    let source = create_source(&server, Duration::from_secs(5));
    let error = source.fetch(&Identifier::from("AaB1")).await.unwrap_err();
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/AaB1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let source = create_source(&server, Duration::from_millis(200));
    let result = source.fetch(&Identifier::from("AaB1")).await;
    assert_eq!(result.unwrap_err(), FetchError::Timeout);
}

#[tokio::test]
async fn test_failed_payload_is_dropped() {
    let server = MockServer::start().await;
    mount_page(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/api/posts/AaB1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let source = create_source(&server, Duration::from_secs(5));
    let doc = source.fetch(&Identifier::from("AaB1")).await.unwrap();
    assert!(doc.markup.is_some());
    assert!(doc.payload.is_none());
}

#[tokio::test]
async fn test_undecodable_payload_is_dropped() {
    let server = MockServer::start().await;
    mount_page(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/api/posts/AaB1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let source = create_source(&server, Duration::from_secs(5));
    let doc = source.fetch(&Identifier::from("AaB1")).await.unwrap();
    assert!(doc.payload.is_none());
}

#[tokio::test]
async fn test_payload_429_is_rate_limited() {
    let server = MockServer::start().await;
    mount_page(&server, 200).await;
    Mock::given(method("GET"))
        .and(path("/api/posts/AaB1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let source = create_source(&server, Duration::from_secs(5));
    let result = source.fetch(&Identifier::from("AaB1")).await;
    assert_eq!(result.unwrap_err(), FetchError::RateLimited);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let config = create_test_source("http://127.0.0.1:1");
    let client = build_http_client(&config, Duration::from_secs(2)).unwrap();
    let source = HttpDetailSource::new(client, &config);

    let error = source.fetch(&Identifier::from("AaB1")).await.unwrap_err();
    assert!(matches!(error, FetchError::Network(_)));
    assert!(error.is_transient());
}
