//! Attribute row scanning
//!
//! This module handles collecting `(title, value)` and `(title, availability)`
//! rows from every structural source of a detail document:
//! - Structured widgets (payload, then application state)
//! - Nested "more details" modal pages behind feature rows
//! - Markup row patterns as the last source

use crate::extract::document::{element_text, DetailDocument};
use crate::model::AttributeEntry;
use serde_json::Value;

/// Rows collected from a document, split by nesting depth
///
/// Nested rows come from sub-documents and are only mapped to canonical
/// slots in the backfill pass.
#[derive(Debug, Default)]
pub struct RowScan {
    pub primary: Vec<AttributeEntry>,
    pub nested: Vec<AttributeEntry>,
}

/// Collects rows from all sources in scan order
pub fn scan_rows(doc: &DetailDocument<'_>) -> RowScan {
    let mut scan = RowScan::default();

    for source in doc.widget_sources() {
        for widget in widgets(source) {
            scan_widget(widget, &mut scan);
        }
    }

    scan_markup(doc, &mut scan);

    tracing::trace!(
        "Collected {} primary and {} nested rows",
        scan.primary.len(),
        scan.nested.len()
    );
    scan
}

/// Widgets under the first `sections[].widgets[]` structure in a source
pub fn widgets(source: &Value) -> Vec<&Value> {
    find_sections(source)
        .map(|sections| {
            sections
                .iter()
                .filter_map(|section| section.get("widgets").and_then(Value::as_array))
                .flatten()
                .collect()
        })
        .unwrap_or_default()
}

fn find_sections(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Object(map) => map
            .get("sections")
            .and_then(Value::as_array)
            .or_else(|| map.values().find_map(find_sections)),
        Value::Array(items) => items.iter().find_map(find_sections),
        _ => None,
    }
}

fn scan_widget(widget: &Value, scan: &mut RowScan) {
    let data = widget.get("data").unwrap_or(&Value::Null);

    match widget_type(widget) {
        Some("GROUP_INFO_ROW") => {
            for item in items(data) {
                if let Some(entry) = value_row(item) {
                    scan.primary.push(entry);
                }
            }
        }
        Some("UNEXPANDABLE_ROW") => {
            if let Some(entry) = value_row(data) {
                scan.primary.push(entry);
            }
        }
        Some("GROUP_FEATURE_ROW") => {
            for item in items(data) {
                let available = item
                    .get("available")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if let Some(entry) = feature_row(item, available) {
                    scan.primary.push(entry);
                }
            }
            scan_modal(data, scan);
        }
        _ => {}
    }
}

/// Rows of the modal page attached to a feature group
fn scan_modal(data: &Value, scan: &mut RowScan) {
    let Some(action) = data.get("action") else {
        return;
    };
    if action.get("type").and_then(Value::as_str) != Some("LOAD_MODAL_PAGE") {
        return;
    }

    let widget_list = action
        .pointer("/payload/modal_page/widget_list")
        .and_then(Value::as_array);

    for widget in widget_list.into_iter().flatten() {
        let data = widget.get("data").unwrap_or(&Value::Null);
        let entry = match widget_type(widget) {
            Some("UNEXPANDABLE_ROW") => value_row(data),
            // Modal features are listed only when present
            Some("FEATURE_ROW") => feature_row(data, true),
            _ => None,
        };
        scan.nested.extend(entry);
    }
}

fn widget_type(widget: &Value) -> Option<&str> {
    widget.get("widget_type").and_then(Value::as_str)
}

fn items(data: &Value) -> impl Iterator<Item = &Value> {
    data.get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn value_row(data: &Value) -> Option<AttributeEntry> {
    let title = json_text(data.get("title")?)?;
    let value = data.get("value").and_then(json_text).unwrap_or_default();
    Some(AttributeEntry::valued(title, value))
}

fn feature_row(data: &Value, available: bool) -> Option<AttributeEntry> {
    let title = json_text(data.get("title")?)?;
    let key = data
        .pointer("/icon/icon_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(AttributeEntry::feature(title, available, key))
}

/// Strings are trimmed; numbers keep their JSON rendering
fn json_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn scan_markup(doc: &DetailDocument<'_>, scan: &mut RowScan) {
    for table in doc.select(".kt-group-row") {
        let titles = select_texts(&table, "th, .kt-group-row-item__title");
        let values = select_texts(&table, "td, .kt-group-row-item__value");
        for (title, value) in titles.into_iter().zip(values) {
            if !title.is_empty() {
                scan.primary.push(AttributeEntry::valued(title, value));
            }
        }
    }

    for row in doc.select(".kt-unexpandable-row") {
        let title = select_texts(&row, ".kt-unexpandable-row__title")
            .into_iter()
            .next();
        let value = select_texts(&row, ".kt-unexpandable-row__value")
            .into_iter()
            .next();
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            scan.primary
                .push(AttributeEntry::valued(title, value.unwrap_or_default()));
        }
    }

    for row in doc.select(".kt-feature-row") {
        let title = select_texts(&row, ".kt-feature-row__title")
            .into_iter()
            .next()
            .unwrap_or_else(|| element_text(&row));
        let disabled = row
            .value()
            .classes()
            .any(|class| class.contains("disabled") || class.contains("unavailable"));
        if !title.is_empty() {
            scan.primary
                .push(AttributeEntry::feature(title, !disabled, None));
        }
    }
}

fn select_texts(element: &scraper::ElementRef<'_>, selector: &str) -> Vec<String> {
    match scraper::Selector::parse(selector) {
        Ok(selector) => element
            .select(&selector)
            .map(|child| element_text(&child))
            .collect(),
        Err(_) => Vec::new(),
    }
}
