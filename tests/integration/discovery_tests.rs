//! Listing discovery against a mock marketplace API

use crate::create_test_source;
use listing_harvest::config::BoundingBox;
use listing_harvest::crawler::{build_http_client, Cursor, ListingDiscovery};
use listing_harvest::model::Identifier;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn post_widget(token: &str) -> Value {
    json!({
        "widget_type": "POST_ROW",
        "data": {"token": token, "action": {"payload": {"token": token}}}
    })
}

/// A search page whose last widget carries `sort_date` when a cursor is given
fn search_page(tokens: &[&str], next_cursor: Option<&str>) -> Value {
    let mut widgets: Vec<Value> = tokens.iter().map(|t| post_widget(t)).collect();
    if let (Some(cursor), Some(last)) = (next_cursor, widgets.last_mut()) {
        last["data"]["action"]["payload"]["web_info"] = json!({"sort_date": cursor});
    }
    json!({"list_widgets": widgets})
}

fn cursor_matcher(cursor: &str) -> Value {
    json!({"search_data": {"server_payload": {"additional_form_data": {"data": {
        "last_post_date": {"str": {"value": cursor}}
    }}}}})
}

fn create_discovery(server: &MockServer, max_pages: u32) -> ListingDiscovery {
    let source = create_test_source(&server.uri());
    let client = build_http_client(&source, Duration::from_secs(5)).unwrap();
    ListingDiscovery::new(client, &source, max_pages)
}

fn ids(values: &[&str]) -> Vec<Identifier> {
    values.iter().map(|v| Identifier::from(*v)).collect()
}

#[tokio::test]
async fn test_search_follows_cursor_until_exhausted() {
    let server = MockServer::start().await;

    // Cursor-specific mocks are mounted first so they take precedence
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(cursor_matcher("c1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["C", "B"], None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_page(&["A", "B"], Some("c1"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 10);
    let found = discovery.search_all().await;

    assert_eq!(found, ids(&["A", "B", "C"]));
}

#[tokio::test]
async fn test_search_respects_page_ceiling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(cursor_matcher("c2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["C"], Some("c3"))))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(cursor_matcher("c1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["B"], Some("c2"))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["A"], Some("c1"))))
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 2);
    let found = discovery.search_all().await;

    assert_eq!(found, ids(&["A", "B"]));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_stops_when_cursor_stalls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["A"], Some("same"))))
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 10);
    let found = discovery.search_all().await;

    assert_eq!(found, ids(&["A"]));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_error_ends_pagination_with_partial_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(cursor_matcher("c1")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_page(&["A", "B"], Some("c1"))),
        )
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 10);
    assert_eq!(discovery.search_all().await, ids(&["A", "B"]));
}

#[tokio::test]
async fn test_empty_first_page_yields_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list_widgets": []})))
        .expect(1)
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 5);
    assert!(discovery.search_all().await.is_empty());
}

#[tokio::test]
async fn test_fetch_page_reports_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 5);
    let result = discovery.fetch_page(Some(&Cursor::new("c1"))).await;
    assert!(matches!(
        result,
        Err(listing_harvest::FetchError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_search_request_carries_scope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "city_ids": ["1"],
            "search_data": {"form_data": {"data": {
                "category": {"str": {"value": "residential-sell"}}
            }}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&["A"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let discovery = create_discovery(&server, 5);
    assert_eq!(discovery.search_all().await, ids(&["A"]));
}

#[tokio::test]
async fn test_viewport_returns_tokens_in_one_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/viewport"))
        .and(body_partial_json(json!({
            "camera_info": {"bbox": {"min_latitude": 35.6, "max_longitude": 51.5}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "map_idle_action_log": {"server_side_info": {"info": {
                "post_tokens": ["V1", "V2", " "]
            }}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bbox = BoundingBox {
        min_latitude: 35.6,
        min_longitude: 51.3,
        max_latitude: 35.8,
        max_longitude: 51.5,
        zoom: None,
    };
    let discovery = create_discovery(&server, 5);
    assert_eq!(discovery.fetch_viewport(&bbox).await, ids(&["V1", "V2"]));
}

#[tokio::test]
async fn test_viewport_failure_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/viewport"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let bbox = BoundingBox {
        min_latitude: 35.6,
        min_longitude: 51.3,
        max_latitude: 35.8,
        max_longitude: 51.5,
        zoom: Some(12.0),
    };
    let discovery = create_discovery(&server, 5);
    assert!(discovery.fetch_viewport(&bbox).await.is_empty());
}
