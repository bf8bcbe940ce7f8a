use crate::model::{AttributeEntry, Identifier, Number};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validated, fully normalized listing ready for persistence and indexing
///
/// `identifier` and `title` are always present; every numeric field is an
/// integer, a float or null and every feature flag is a plain boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub identifier: Identifier,
    pub title: String,
    pub description: Option<String>,
    pub image_urls: Vec<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub price: Option<Number>,
    pub price_per_meter: Option<Number>,
    pub area: Option<Number>,
    pub land_area: Option<Number>,
    pub year_built: Option<Number>,
    pub bedrooms: Option<Number>,

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

    pub has_parking: bool,
    pub has_storage: bool,
    pub has_balcony: bool,

    pub attributes: Vec<AttributeEntry>,
    pub scraped_at: DateTime<Utc>,
}
