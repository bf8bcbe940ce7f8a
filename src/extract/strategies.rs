//! Ordered extraction strategies per field
//!
//! Each field owns a chain of [`Strategy`] values tried in confidence order;
//! the first strategy yielding a value wins. Later entries are cheaper, more
//! general fallbacks. Adding a new source for a field means adding one row to
//! its chain.

use crate::extract::document::{element_text, find_key, DetailDocument};
use crate::model::GeoPoint;
use crate::normalize::parse_json_number;
use scraper::ElementRef;
use serde_json::Value;
use std::collections::HashSet;

/// One extraction attempt for a field
pub struct Strategy<T> {
    pub name: &'static str,
    pub run: fn(&DetailDocument<'_>) -> Option<T>,
}

/// Runs a strategy chain and returns the first hit
///
/// # Arguments
///
/// * `field` - Field name used in log lines
/// * `chain` - Strategies in confidence order
/// * `doc` - The parsed detail document
pub fn resolve<T>(field: &str, chain: &[Strategy<T>], doc: &DetailDocument<'_>) -> Option<T> {
    for strategy in chain {
        if let Some(value) = (strategy.run)(doc) {
            tracing::debug!("Resolved {} via {}", field, strategy.name);
            return Some(value);
        }
    }

    tracing::debug!("No strategy resolved {}", field);
    None
}

pub const TITLE_CHAIN: &[Strategy<String>] = &[
    Strategy {
        name: "page-title-heading",
        run: title_primary,
    },
    Strategy {
        name: "any-heading",
        run: title_secondary,
    },
    Strategy {
        name: "payload-title-row",
        run: title_from_widgets,
    },
    Strategy {
        name: "og-title",
        run: title_from_og,
    },
    Strategy {
        name: "document-title",
        run: title_from_head,
    },
];

pub const DESCRIPTION_CHAIN: &[Strategy<String>] = &[
    Strategy {
        name: "description-row",
        run: description_primary,
    },
    Strategy {
        name: "payload-description-row",
        run: description_from_widgets,
    },
    Strategy {
        name: "labelled-sibling",
        run: description_after_label,
    },
    Strategy {
        name: "longest-paragraph",
        run: description_longest_paragraph,
    },
];

pub const IMAGE_CHAIN: &[Strategy<Vec<String>>] = &[
    Strategy {
        name: "gallery-nodes",
        run: images_from_gallery,
    },
    Strategy {
        name: "ld-json-image",
        run: images_from_ld_json,
    },
    Strategy {
        name: "og-image",
        run: images_from_og,
    },
];

pub const LOCATION_CHAIN: &[Strategy<GeoPoint>] = &[
    Strategy {
        name: "ld-json-geo",
        run: location_from_ld_json,
    },
    Strategy {
        name: "payload-seo-geo",
        run: location_from_payload,
    },
    Strategy {
        name: "app-state-geo",
        run: location_from_app_state,
    },
];

/// Separators between a page title and the site name
const TITLE_SUFFIX_SEPARATORS: &[&str] = &[" | ", " - ", " – ", " :: "];

/// Labels preceding the description block
const DESCRIPTION_LABELS: &[&str] = &["توضیحات", "description"];

/// Paragraphs shorter than this are not considered a description
const MIN_PARAGRAPH_CHARS: usize = 40;

// ===== Title =====

fn title_primary(doc: &DetailDocument<'_>) -> Option<String> {
    doc.first_text("h1[class*='kt-page-title__title']")
}

fn title_secondary(doc: &DetailDocument<'_>) -> Option<String> {
    doc.first_text("div.kt-page-title h1")
        .or_else(|| doc.first_text("h1"))
}

fn title_from_widgets(doc: &DetailDocument<'_>) -> Option<String> {
    widget_text(doc, "TITLE_ROW", "title")
}

fn title_from_og(doc: &DetailDocument<'_>) -> Option<String> {
    doc.meta_content("og:title")
        .map(|t| trim_site_suffix(&t))
        .filter(|t| !t.is_empty())
}

fn title_from_head(doc: &DetailDocument<'_>) -> Option<String> {
    doc.first_text("title")
        .map(|t| trim_site_suffix(&t))
        .filter(|t| !t.is_empty())
}

/// Removes a trailing site name after the last separator
pub fn trim_site_suffix(title: &str) -> String {
    let cut = TITLE_SUFFIX_SEPARATORS
        .iter()
        .filter_map(|sep| title.rfind(sep))
        .max();

    match cut {
        Some(index) if index > 0 => title[..index].trim().to_string(),
        _ => title.trim().to_string(),
    }
}

// ===== Description =====

fn description_primary(doc: &DetailDocument<'_>) -> Option<String> {
    let blocks: Vec<String> = doc
        .select("p[class*='kt-description-row__text']")
        .iter()
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();

    (!blocks.is_empty()).then(|| blocks.join("\n"))
}

fn description_from_widgets(doc: &DetailDocument<'_>) -> Option<String> {
    widget_text(doc, "DESCRIPTION_ROW", "text")
}

fn description_after_label(doc: &DetailDocument<'_>) -> Option<String> {
    let candidates = doc.select("h1, h2, h3, h4, h5, h6, div, span, p, strong");

    candidates
        .iter()
        .filter(|element| {
            let own = element_text(element).to_lowercase();
            DESCRIPTION_LABELS.iter().any(|label| own == *label)
        })
        .find_map(|label| {
            following_text(label).or_else(|| {
                label
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|parent| following_text(&parent))
            })
        })
}

/// Text of the first following sibling element with content
fn following_text(element: &ElementRef<'_>) -> Option<String> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .map(|sibling| element_text(&sibling))
        .find(|text| !text.is_empty())
}

fn description_longest_paragraph(doc: &DetailDocument<'_>) -> Option<String> {
    let mut paragraphs = doc.select("main p, article p, [role='main'] p");
    if paragraphs.is_empty() {
        paragraphs = doc.select("p");
    }

    paragraphs
        .iter()
        .map(element_text)
        .filter(|text| text.chars().count() >= MIN_PARAGRAPH_CHARS)
        .max_by_key(|text| text.chars().count())
}

// ===== Images =====

fn images_from_gallery(doc: &DetailDocument<'_>) -> Option<Vec<String>> {
    let nodes = doc.select(
        "[class*='carousel'] img, [class*='carousel'] picture source, \
         [class*='gallery'] img, [class*='gallery'] picture source",
    );

    let urls = nodes
        .iter()
        .filter_map(|node| image_candidate(node).and_then(|src| doc.resolve_url(&src)));
    non_empty(dedup_urls(urls))
}

/// Best image reference on a node: largest srcset entry, then data-src, then src
fn image_candidate(node: &ElementRef<'_>) -> Option<String> {
    let attrs = node.value();
    attrs
        .attr("srcset")
        .and_then(best_srcset_entry)
        .or_else(|| attrs.attr("data-src").map(str::to_string))
        .or_else(|| attrs.attr("src").map(str::to_string))
        .filter(|src| !src.trim().is_empty() && !src.starts_with("data:"))
}

/// Picks the srcset entry with the largest `w`/`x` descriptor
///
/// Entries without a parseable descriptor lose to those with one; when no
/// entry has a descriptor the last one is taken.
pub fn best_srcset_entry(srcset: &str) -> Option<String> {
    let entries: Vec<(&str, Option<f64>)> = srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let size = parts.next().and_then(|d| {
                d.strip_suffix('w')
                    .or_else(|| d.strip_suffix('x'))
                    .and_then(|n| n.parse::<f64>().ok())
            });
            Some((url, size))
        })
        .collect();

    let best = entries
        .iter()
        .filter_map(|(url, size)| size.map(|s| (*url, s)))
        .fold(None::<(&str, f64)>, |best, (url, size)| match best {
            Some((_, top)) if top >= size => best,
            _ => Some((url, size)),
        })
        .map(|(url, _)| url);

    best.or_else(|| entries.last().map(|(url, _)| *url))
        .map(str::to_string)
}

fn images_from_ld_json(doc: &DetailDocument<'_>) -> Option<Vec<String>> {
    let urls = doc
        .ld_json
        .iter()
        .filter_map(|block| find_key(block, "image"))
        .flat_map(image_references)
        .filter_map(|src| doc.resolve_url(&src));
    non_empty(dedup_urls(urls))
}

/// Image references in an ld+json `image` value: string, object or list
fn image_references(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("contentUrl"))
            .and_then(Value::as_str)
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        Value::Array(items) => items.iter().flat_map(image_references).collect(),
        _ => Vec::new(),
    }
}

fn images_from_og(doc: &DetailDocument<'_>) -> Option<Vec<String>> {
    let url = doc.meta_content("og:image")?;
    doc.resolve_url(&url).map(|u| vec![u])
}

fn dedup_urls(urls: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.filter(|url| seen.insert(url.clone())).collect()
}

fn non_empty(urls: Vec<String>) -> Option<Vec<String>> {
    (!urls.is_empty()).then_some(urls)
}

// ===== Location =====

fn location_from_ld_json(doc: &DetailDocument<'_>) -> Option<GeoPoint> {
    doc.ld_json
        .iter()
        .filter_map(|block| find_key(block, "geo"))
        .find_map(geo_from_value)
}

fn location_from_payload(doc: &DetailDocument<'_>) -> Option<GeoPoint> {
    doc.payload
        .and_then(|p| p.pointer("/seo/post_seo_schema/geo"))
        .and_then(geo_from_value)
}

fn location_from_app_state(doc: &DetailDocument<'_>) -> Option<GeoPoint> {
    let state = doc.app_state.as_ref()?;
    find_key(state, "geo")
        .and_then(geo_from_value)
        .or_else(|| find_coordinates(state))
}

/// Depth-first search for any object carrying both coordinates
fn find_coordinates(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Object(map) => geo_from_value(value)
            .or_else(|| map.values().find_map(find_coordinates)),
        Value::Array(items) => items.iter().find_map(find_coordinates),
        _ => None,
    }
}

/// Reads `{latitude, longitude}`, accepting numbers or numeric strings
fn geo_from_value(value: &Value) -> Option<GeoPoint> {
    let latitude = parse_json_number(value.get("latitude")?)?.as_f64();
    let longitude = parse_json_number(value.get("longitude")?)?.as_f64();
    GeoPoint::new(latitude, longitude)
}

// ===== Shared =====

/// First non-empty `data.<field>` string on a widget of the given type
fn widget_text(doc: &DetailDocument<'_>, widget_type: &str, field: &str) -> Option<String> {
    doc.widget_sources()
        .flat_map(super::rows::widgets)
        .filter(|widget| widget.get("widget_type").and_then(Value::as_str) == Some(widget_type))
        .filter_map(|widget| widget.pointer(&format!("/data/{}", field)))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
