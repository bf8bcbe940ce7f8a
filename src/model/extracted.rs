use crate::model::{AttributeEntry, AttributeList, GeoPoint, Identifier, Number};

/// A numeric slot value before coercion
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(Number),
    Text(String),
}

/// Intermediate holder for every canonical field slot
///
/// `None` means no strategy has produced the field yet, which is distinct from
/// an explicitly empty value such as `Some(String::new())`.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFields {
    pub identifier: Option<Identifier>,

    pub title: Option<String>,
    pub description: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub location: Option<GeoPoint>,

    // Numeric slots
    pub area: Option<RawValue>,
    pub land_area: Option<RawValue>,
    pub year_built: Option<RawValue>,
    pub bedrooms: Option<RawValue>,
    pub price: Option<RawValue>,
    pub price_per_meter: Option<RawValue>,

    // Text slots
    pub property_type: Option<String>,
    pub floor_info: Option<String>,
    pub title_deed_type: Option<String>,
    pub building_direction: Option<String>,
    pub renovation_status: Option<String>,
    pub floor_material: Option<String>,
    pub bathroom_type: Option<String>,
    pub cooling_system: Option<String>,
    pub heating_system: Option<String>,
    pub hot_water_system: Option<String>,

    // Boolean features keep the row that mentioned them
    pub has_parking: Option<AttributeEntry>,
    pub has_storage: Option<AttributeEntry>,
    pub has_balcony: Option<AttributeEntry>,

    pub attributes: AttributeList,
}

impl ExtractedFields {
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier: Some(identifier),
            ..Self::default()
        }
    }
}
