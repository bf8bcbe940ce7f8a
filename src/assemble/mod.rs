//! Canonical record assembly
//!
//! This module handles:
//! - Validating the required identifier and title
//! - Coercing numeric slots to integers or floats
//! - Resolving feature rows to strict booleans
//! - Backfilling core attributes so the attribute list covers the structured fields
//! - Classifying the property category when no row provided it

use crate::model::{
    AttributeEntry, AttributeList, CanonicalRecord, ExtractedFields, Number, RawValue,
    UNRESOLVED_TITLE,
};
use crate::normalize::{classify_property, contains_term, parse_number};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons a listing is rejected before persistence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listing has no identifier")]
    MissingIdentifier,

    #[error("listing title is missing or unresolved")]
    MissingTitle,
}

/// Words that turn a feature row into `false`
const NEGATIVE_WORDS: &[&str] = &["ندارد", "نیست", "فاقد", "خیر", "no", "none", "false", "0"];

/// Attribute title used for the property category
const PROPERTY_TYPE_TITLE: &str = "نوع ملک";

/// Assembles a validated record stamped with the current time
pub fn assemble(fields: ExtractedFields) -> Result<CanonicalRecord, ValidationError> {
    assemble_at(fields, Utc::now())
}

/// Assembles a validated record with an explicit timestamp
///
/// # Arguments
///
/// * `fields` - Extractor output for one listing
/// * `scraped_at` - Time stamped on the record
///
/// # Returns
///
/// * `Ok(CanonicalRecord)` - The normalized record
/// * `Err(ValidationError)` - The identifier or title is missing
pub fn assemble_at(
    fields: ExtractedFields,
    scraped_at: DateTime<Utc>,
) -> Result<CanonicalRecord, ValidationError> {
    let identifier = fields
        .identifier
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            tracing::warn!("Rejecting listing without identifier");
            ValidationError::MissingIdentifier
        })?;

    let title = fields
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != UNRESOLVED_TITLE)
        .map(str::to_string)
        .ok_or_else(|| {
            tracing::warn!(id = %identifier, "Rejecting listing without a resolved title");
            ValidationError::MissingTitle
        })?;

    let description = clean_text(fields.description);

    let mut property_type = clean_text(fields.property_type);
    if property_type.is_none() {
        let category = classify_property(&title, description.as_deref().unwrap_or_default());
        property_type = category.label().map(str::to_string);
        if let Some(label) = &property_type {
            tracing::debug!(id = %identifier, "Classified property as {}", label);
        }
    }

    let area = coerce(fields.area);
    let land_area = coerce(fields.land_area);
    let year_built = coerce(fields.year_built).map(Number::truncate);
    let bedrooms = coerce(fields.bedrooms).map(Number::truncate);
    let price = coerce(fields.price);
    let price_per_meter = coerce(fields.price_per_meter);
    let floor_info = clean_text(fields.floor_info);

    let mut attributes = fields.attributes;
    backfill_attributes(
        &mut attributes,
        &[
            ("متراژ", area.map(|n| n.to_string())),
            ("متراژ زمین", land_area.map(|n| n.to_string())),
            (PROPERTY_TYPE_TITLE, property_type.clone()),
            ("ساخت", year_built.map(|n| n.to_string())),
            ("اتاق", bedrooms.map(|n| n.to_string())),
            ("قیمت کل", price.map(|n| n.to_string())),
            ("قیمت هر متر", price_per_meter.map(|n| n.to_string())),
            ("طبقه", floor_info.clone()),
        ],
    );

    Ok(CanonicalRecord {
        identifier,
        title,
        description,
        image_urls: fields.image_urls.unwrap_or_default(),
        latitude: fields.location.map(|p| p.latitude),
        longitude: fields.location.map(|p| p.longitude),
        price,
        price_per_meter,
        area,
        land_area,
        year_built,
        bedrooms,
        property_type,
        floor_info,
        title_deed_type: clean_text(fields.title_deed_type),
        building_direction: clean_text(fields.building_direction),
        renovation_status: clean_text(fields.renovation_status),
        floor_material: clean_text(fields.floor_material),
        bathroom_type: clean_text(fields.bathroom_type),
        cooling_system: clean_text(fields.cooling_system),
        heating_system: clean_text(fields.heating_system),
        hot_water_system: clean_text(fields.hot_water_system),
        has_parking: normalize_flag(fields.has_parking.as_ref()),
        has_storage: normalize_flag(fields.has_storage.as_ref()),
        has_balcony: normalize_flag(fields.has_balcony.as_ref()),
        attributes: attributes.into_vec(),
        scraped_at,
    })
}

/// Coerces a numeric slot; unparseable text becomes `None`
pub fn coerce(value: Option<RawValue>) -> Option<Number> {
    match value? {
        RawValue::Number(n) => Some(n),
        RawValue::Text(text) => parse_number(&text),
    }
}

/// Resolves a feature row to a strict boolean
///
/// A missing row or an explicit `available: false` is `false`. Otherwise the
/// row is `true` unless its title or value carries a negative word.
pub fn normalize_flag(entry: Option<&AttributeEntry>) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    if entry.available == Some(false) {
        return false;
    }

    let text = format!("{} {}", entry.title, entry.value.as_deref().unwrap_or_default())
        .to_lowercase();
    !contains_negative_word(&text)
}

fn contains_negative_word(text: &str) -> bool {
    NEGATIVE_WORDS.iter().any(|word| contains_term(text, word))
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn backfill_attributes(attributes: &mut AttributeList, core: &[(&str, Option<String>)]) {
    for (title, value) in core {
        if let Some(value) = value {
            attributes.push(AttributeEntry::valued(*title, value.clone()));
        }
    }
}
