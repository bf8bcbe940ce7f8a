//! Listing data model
//!
//! Types flowing through the pipeline: identifiers, raw detail documents,
//! attribute entries, the intermediate [`ExtractedFields`] and the validated
//! [`CanonicalRecord`].

mod attributes;
mod extracted;
mod record;

pub use attributes::{AttributeEntry, AttributeList};
pub use extracted::{ExtractedFields, RawValue};
pub use record::CanonicalRecord;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored in the title slot when every title strategy failed
pub const UNRESOLVED_TITLE: &str = "N/A";

/// Opaque key naming one listing; the unit of dedup and work dispatch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A normalized numeric value: integral values are kept as integers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Converts a float, collapsing integral values to `Int`
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }

        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
        if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
            Some(Number::Int(value as i64))
        } else {
            Some(Number::Float(value))
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
        }
    }

    /// Drops any fractional part
    pub fn truncate(self) -> Self {
        match self {
            Number::Int(_) => self,
            Number::Float(v) => Number::from_f64(v.trunc()).unwrap_or(self),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Geographic coordinates of a listing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

/// The blob fetched for one identifier: markup, structured payload, or both
///
/// Consumed by extraction and then dropped.
#[derive(Debug, Clone)]
pub struct RawDetailDocument {
    pub identifier: Identifier,

    /// Detail page markup
    pub markup: Option<String>,

    /// Structured detail payload
    pub payload: Option<serde_json::Value>,

    /// URL the markup was served from, used to resolve relative links
    pub url: Option<String>,
}

impl RawDetailDocument {
    pub fn from_markup(identifier: impl Into<Identifier>, markup: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            markup: Some(markup.into()),
            payload: None,
            url: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}
