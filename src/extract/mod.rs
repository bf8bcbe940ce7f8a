//! Multi-strategy field extraction
//!
//! This module handles:
//! - Parsing a raw detail document into markup, payload and embedded JSON
//! - Resolving title, description, images and location through ordered
//!   strategy chains
//! - Collecting attribute rows and mapping known titles onto canonical slots
//! - Falling back to keyword classification for the property category

mod document;
mod mapping;
mod rows;
mod strategies;

pub use document::DetailDocument;
pub use mapping::{apply_rows, map_entry, Pass, Slot, SLOT_RULES};
pub use rows::{scan_rows, RowScan};
pub use strategies::{
    best_srcset_entry, resolve, trim_site_suffix, Strategy, DESCRIPTION_CHAIN, IMAGE_CHAIN,
    LOCATION_CHAIN, TITLE_CHAIN,
};

use crate::model::{ExtractedFields, RawDetailDocument, UNRESOLVED_TITLE};
use crate::normalize::{classify_property, PropertyCategory};

/// Extracts every canonical field slot from a raw detail document
///
/// Never fails: a field whose whole chain comes up empty keeps its default
/// (`"N/A"` title, empty description, no images, unset location).
///
/// # Example
///
/// ```
/// use listing_harvest::extract_fields;
/// use listing_harvest::model::RawDetailDocument;
///
/// let raw = RawDetailDocument::from_markup("AaB1", "<h1>Sunny flat</h1>");
/// let fields = extract_fields(&raw);
/// assert_eq!(fields.title.as_deref(), Some("Sunny flat"));
/// ```
pub fn extract_fields(raw: &RawDetailDocument) -> ExtractedFields {
    let doc = DetailDocument::parse(raw);
    let mut fields = ExtractedFields::new(raw.identifier.clone());

    fields.title = Some(
        resolve("title", TITLE_CHAIN, &doc).unwrap_or_else(|| UNRESOLVED_TITLE.to_string()),
    );
    fields.description = Some(resolve("description", DESCRIPTION_CHAIN, &doc).unwrap_or_default());
    fields.image_urls = Some(resolve("images", IMAGE_CHAIN, &doc).unwrap_or_default());
    fields.location = resolve("location", LOCATION_CHAIN, &doc);

    apply_rows(scan_rows(&doc), &mut fields);

    if fields.property_type.is_none() {
        let category = classify_property(
            fields.title.as_deref().unwrap_or_default(),
            fields.description.as_deref().unwrap_or_default(),
        );
        if category != PropertyCategory::Unknown {
            fields.property_type = category.label().map(str::to_string);
        }
    }

    tracing::debug!(
        id = %raw.identifier,
        "Extracted {} attributes, {} images",
        fields.attributes.len(),
        fields.image_urls.as_ref().map_or(0, Vec::len)
    );

    fields
}
