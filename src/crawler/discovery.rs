//! Listing discovery
//!
//! This module handles finding listing identifiers on the remote index:
//! - Cursor-paginated search scoped to a category and a set of cities
//! - Single-shot viewport queries over a bounding box
//!
//! Discovery never fails the run: a page that cannot be fetched or decoded is
//! logged and ends pagination with whatever was collected so far.

use crate::config::{BoundingBox, SourceConfig};
use crate::crawler::fetcher::{send_checked, with_user_agent, FetchError};
use crate::crawler::limiter::SharedLimiter;
use crate::model::Identifier;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Zoom sent with viewport queries when the bounding box has none
const DEFAULT_ZOOM: f64 = 14.568_499_456_622_654;

/// Opaque pagination position: the sort key of the last listing seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of discovery results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryPage {
    pub identifiers: Vec<Identifier>,
    pub next_cursor: Option<Cursor>,
}

/// Client for the marketplace's search and viewport endpoints
pub struct ListingDiscovery {
    client: Client,
    search_url: String,
    viewport_url: String,
    city_ids: Vec<String>,
    category: String,
    user_agents: Vec<String>,
    max_pages: u32,
    limiter: Option<SharedLimiter>,
}

impl ListingDiscovery {
    /// Creates a discovery client
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client shared with the rest of the run
    /// * `source` - Endpoints, city scope and category
    /// * `max_pages` - Search page ceiling per run
    pub fn new(client: Client, source: &SourceConfig, max_pages: u32) -> Self {
        Self {
            client,
            search_url: source.search_url.clone(),
            viewport_url: source.viewport_url.clone(),
            city_ids: source.city_ids.clone(),
            category: source.category.clone(),
            user_agents: source.user_agents.clone(),
            max_pages,
            limiter: None,
        }
    }

    /// Paces discovery requests through a rate limiter
    pub fn with_limiter(mut self, limiter: SharedLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Fetches one search page
    ///
    /// # Arguments
    ///
    /// * `cursor` - Cursor from the previous page, `None` for the first page
    pub async fn fetch_page(&self, cursor: Option<&Cursor>) -> Result<DiscoveryPage, FetchError> {
        let body = self.post_json(&self.search_url, &self.search_payload(cursor)).await?;
        Ok(parse_search_page(&body))
    }

    /// Walks search pages until the stream ends or the page ceiling is hit
    ///
    /// Returns identifiers deduplicated in first-seen order. Failures end
    /// pagination early but never propagate.
    pub async fn search_all(&self) -> Vec<Identifier> {
        let mut seen = HashSet::new();
        let mut identifiers = Vec::new();
        let mut cursor: Option<Cursor> = None;

        for page_number in 1..=self.max_pages {
            tracing::info!(
                "Fetching search page {} (cursor: {})",
                page_number,
                cursor.as_ref().map_or("none", Cursor::as_str)
            );

            let page = match self.fetch_page(cursor.as_ref()).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Search page {} failed, stopping pagination: {}", page_number, e);
                    break;
                }
            };

            let found = page.identifiers.len();
            for id in page.identifiers {
                if seen.insert(id.clone()) {
                    identifiers.push(id);
                }
            }
            tracing::info!("Search page {} yielded {} listings", page_number, found);

            match page.next_cursor {
                None => {
                    tracing::info!("No further cursor after page {}, search complete", page_number);
                    break;
                }
                Some(next) if cursor.as_ref() == Some(&next) => {
                    tracing::warn!("Cursor did not advance after page {}, stopping", page_number);
                    break;
                }
                Some(next) => cursor = Some(next),
            }

            if page_number == self.max_pages {
                tracing::info!("Reached page ceiling of {}", self.max_pages);
            }
        }

        identifiers
    }

    /// Returns every identifier inside a bounding box in one call
    ///
    /// A failed request yields an empty list.
    pub async fn fetch_viewport(&self, bbox: &BoundingBox) -> Vec<Identifier> {
        tracing::info!(
            "Fetching viewport listings for bbox {},{},{},{}",
            bbox.min_longitude,
            bbox.min_latitude,
            bbox.max_longitude,
            bbox.max_latitude
        );

        match self.post_json(&self.viewport_url, &self.viewport_payload(bbox)).await {
            Ok(body) => {
                let identifiers = parse_viewport_response(&body);
                tracing::info!("Viewport query returned {} listings", identifiers.len());
                identifiers
            }
            Err(e) => {
                tracing::error!("Viewport query failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Search request body; the cursor travels as `last_post_date`
    pub fn search_payload(&self, cursor: Option<&Cursor>) -> Value {
        let mut extra = json!({
            "sort": {"str": {"value": "sort_date"}}
        });
        if let Some(cursor) = cursor {
            extra["last_post_date"] = json!({"str": {"value": cursor.as_str()}});
        }

        json!({
            "city_ids": self.city_ids,
            "source_view": "CATEGORY",
            "disable_recommendation": false,
            "search_data": {
                "form_data": {
                    "data": {"category": {"str": {"value": self.category}}}
                },
                "server_payload": {
                    "@type": "type.googleapis.com/widgets.SearchData.ServerPayload",
                    "additional_form_data": {"data": extra}
                }
            }
        })
    }

    /// Viewport request body for a bounding box
    pub fn viewport_payload(&self, bbox: &BoundingBox) -> Value {
        json!({
            "city_ids": self.city_ids,
            "search_data": {
                "form_data": {
                    "data": {
                        "bbox": {"repeated_float": {"value": [
                            {"value": bbox.min_longitude},
                            {"value": bbox.min_latitude},
                            {"value": bbox.max_longitude},
                            {"value": bbox.max_latitude}
                        ]}},
                        "category": {"str": {"value": self.category}}
                    }
                }
            },
            "camera_info": {
                "bbox": {
                    "min_latitude": bbox.min_latitude,
                    "min_longitude": bbox.min_longitude,
                    "max_latitude": bbox.max_latitude,
                    "max_longitude": bbox.max_longitude
                },
                "place_hash": format!("{}||{}", self.city_ids.join(","), self.category),
                "zoom": bbox.zoom.unwrap_or(DEFAULT_ZOOM)
            }
        })
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, FetchError> {
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }

        let request = with_user_agent(self.client.post(url).json(payload), &self.user_agents);
        let response = send_checked(request).await?;
        let text = response.text().await.map_err(|e| FetchError::from_reqwest(&e))?;

        serde_json::from_str(&text).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// Extracts identifiers and the next cursor from a search response
///
/// Identifiers are read from `list_widgets[].data.token` (or
/// `data.action.payload.token`). The cursor is the `sort_date` found in the
/// last widget, falling back to a top-level `last_post_date`.
pub fn parse_search_page(body: &Value) -> DiscoveryPage {
    let widgets = body
        .get("list_widgets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let identifiers = widgets
        .iter()
        .filter_map(|widget| {
            widget
                .pointer("/data/token")
                .or_else(|| widget.pointer("/data/action/payload/token"))
                .and_then(Value::as_str)
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Identifier::from)
        .collect();

    let next_cursor = widgets
        .last()
        .and_then(|widget| find_scalar(widget, "sort_date"))
        .or_else(|| body.get("last_post_date").and_then(scalar_text))
        .map(Cursor);

    DiscoveryPage {
        identifiers,
        next_cursor,
    }
}

/// Extracts identifiers from a viewport response
pub fn parse_viewport_response(body: &Value) -> Vec<Identifier> {
    body.pointer("/map_idle_action_log/server_side_info/info/post_tokens")
        .and_then(Value::as_array)
        .map(|tokens| {
            tokens
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(Identifier::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Depth-first search for a scalar stored under `key`
fn find_scalar(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get(key)
            .and_then(scalar_text)
            .or_else(|| map.values().find_map(|child| find_scalar(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_scalar(child, key)),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
