//! Parsed view over a raw detail document
//!
//! Markup is parsed once with `scraper`; embedded JSON blocks (ld+json
//! metadata and the application-state assignment) are decoded up front so
//! every strategy works off the same parsed inputs.

use crate::model::RawDetailDocument;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

/// Script markers that assign the embedded application state
const APP_STATE_MARKERS: &[&str] = &["window.__PRELOADED_STATE__", "window.__INITIAL_STATE__"];

/// All inputs an extraction strategy may consult
pub struct DetailDocument<'a> {
    /// Parsed markup, if any was fetched
    pub html: Option<Html>,

    /// Structured detail payload
    pub payload: Option<&'a Value>,

    /// Decoded `<script type="application/ld+json">` blocks
    pub ld_json: Vec<Value>,

    /// Decoded application-state blob
    pub app_state: Option<Value>,

    /// Document URL for resolving relative references
    pub base_url: Option<Url>,
}

impl<'a> DetailDocument<'a> {
    /// Parses the markup and decodes embedded JSON
    pub fn parse(raw: &'a RawDetailDocument) -> Self {
        let html = raw.markup.as_deref().map(Html::parse_document);

        let ld_json = html.as_ref().map(collect_ld_json).unwrap_or_default();
        let app_state = html.as_ref().and_then(find_app_state);
        let base_url = raw.url.as_deref().and_then(|u| Url::parse(u).ok());

        Self {
            html,
            payload: raw.payload.as_ref(),
            ld_json,
            app_state,
            base_url,
        }
    }

    /// Elements matching a CSS selector; empty when there is no markup
    pub fn select(&self, selector: &str) -> Vec<ElementRef<'_>> {
        let (Some(html), Ok(selector)) = (self.html.as_ref(), Selector::parse(selector)) else {
            return Vec::new();
        };
        html.select(&selector).collect()
    }

    /// Trimmed text of the first matching element with non-empty text
    pub fn first_text(&self, selector: &str) -> Option<String> {
        self.select(selector)
            .into_iter()
            .map(|element| element_text(&element))
            .find(|text| !text.is_empty())
    }

    /// `content` of a `<meta property=…>` or `<meta name=…>` tag
    pub fn meta_content(&self, key: &str) -> Option<String> {
        let selector = format!("meta[property='{0}'], meta[name='{0}']", key);
        self.select(&selector)
            .into_iter()
            .filter_map(|element| element.value().attr("content"))
            .map(|content| content.trim().to_string())
            .find(|content| !content.is_empty())
    }

    /// Resolves a reference against the document URL
    ///
    /// Returns `None` for `data:` URIs and references that do not resolve to
    /// an HTTP(S) URL.
    pub fn resolve_url(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with("data:") {
            return None;
        }

        let resolved = match &self.base_url {
            Some(base) => base.join(reference).ok()?,
            None => Url::parse(reference).ok()?,
        };

        matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
    }

    /// Structured sources holding row widgets, in scan order
    pub fn widget_sources(&self) -> impl Iterator<Item = &Value> {
        let payload: Option<&Value> = self.payload;
        payload.into_iter().chain(self.app_state.as_ref())
    }
}

/// Whitespace-normalized text content of an element
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_ld_json(html: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };

    html.select(&selector)
        .filter_map(|script| {
            let text = script.text().collect::<String>();
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Skipping malformed ld+json block: {}", e);
                    None
                }
            }
        })
        .collect()
}

fn find_app_state(html: &Html) -> Option<Value> {
    let selector = Selector::parse("script").ok()?;

    html.select(&selector).find_map(|script| {
        let text = script.text().collect::<String>();
        APP_STATE_MARKERS
            .iter()
            .find_map(|marker| parse_assignment(&text, marker))
    })
}

/// Decodes the JSON assigned after `marker =` in a script body
fn parse_assignment(script: &str, marker: &str) -> Option<Value> {
    let start = script.find(marker)? + marker.len();
    let rest = script[start..].trim_start();
    let body = rest.strip_prefix('=')?.trim();

    // Only the first statement belongs to the assignment
    let body = body.trim_end_matches(';');
    let mut stream = serde_json::Deserializer::from_str(body).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if value.is_object() => Some(value),
        Some(Err(e)) => {
            tracing::debug!("Could not decode application state: {}", e);
            None
        }
        _ => None,
    }
}

/// Depth-first search for the first value stored under `key`
pub fn find_key<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|child| find_key(child, key))),
        Value::Array(items) => items.iter().find_map(|child| find_key(child, key)),
        _ => None,
    }
}
