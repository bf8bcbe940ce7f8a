//! Value normalization
//!
//! This module handles:
//! - Locale-aware numeric parsing (Persian/Arabic digits, unit words, separators)
//! - Keyword-based property category classification

mod classify;
mod number;

pub use classify::{classify_property, PropertyCategory};
pub use number::{parse_json_number, parse_number};

/// Keyword lookup in lowercased text
///
/// Latin keywords only count as whole tokens, so "land" does not match
/// "island". Persian keywords match anywhere, which keeps suffixed forms
/// such as "ویلایی" reachable from "ویلا".
pub(crate) fn contains_term(text: &str, term: &str) -> bool {
    if term.is_ascii() {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|token| token == term)
    } else {
        text.contains(term)
    }
}
