//! Opaque crawl inputs: bounding boxes and identifier lists

use crate::model::Identifier;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// Geographic rectangle used by the viewport discovery query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,

    /// Map zoom level sent alongside the rectangle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
}

impl BoundingBox {
    /// Checks ordering and coordinate ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);

        if !lat_ok(self.min_latitude) || !lat_ok(self.max_latitude) {
            return Err(ConfigError::Validation(
                "bounding box latitudes must be within [-90, 90]".to_string(),
            ));
        }

        if !lon_ok(self.min_longitude) || !lon_ok(self.max_longitude) {
            return Err(ConfigError::Validation(
                "bounding box longitudes must be within [-180, 180]".to_string(),
            ));
        }

        if self.min_latitude >= self.max_latitude || self.min_longitude >= self.max_longitude {
            return Err(ConfigError::Validation(format!(
                "bounding box minimums must be below maximums: {:?}",
                self
            )));
        }

        Ok(())
    }
}

/// Loads and validates a bounding box JSON file
pub fn load_bbox(path: &Path) -> Result<BoundingBox, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let bbox: BoundingBox = serde_json::from_str(&content)?;
    bbox.validate()?;
    tracing::info!("Loaded bounding box from {}: {:?}", path.display(), bbox);
    Ok(bbox)
}

/// Writes a bounding box as pretty JSON
pub fn save_bbox(bbox: &BoundingBox, path: &Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(bbox)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Builds a bounding box from a marketplace search URL
///
/// The URL carries the rectangle in a `bbox` (or `map_bbox`) query parameter
/// ordered `minLon,minLat,maxLon,maxLat`.
pub fn bbox_from_url(url: &str) -> Result<BoundingBox, ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;

    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    let raw = ["bbox", "map_bbox"]
        .iter()
        .find_map(|key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
        .ok_or_else(|| {
            ConfigError::Validation("URL does not contain a bbox or map_bbox parameter".to_string())
        })?;

    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ConfigError::Validation(format!("invalid bbox value '{}': {}", raw, e)))?;

    let [min_longitude, min_latitude, max_longitude, max_latitude] = parts[..] else {
        return Err(ConfigError::Validation(format!(
            "bbox must have exactly four values, got '{}'",
            raw
        )));
    };

    let bbox = BoundingBox {
        min_latitude,
        min_longitude,
        max_latitude,
        max_longitude,
        zoom: None,
    };
    bbox.validate()?;
    Ok(bbox)
}

/// Loads a newline-delimited identifier list
pub fn load_identifier_list(path: &Path) -> Result<Vec<Identifier>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_identifier_list(&content))
}

/// Parses identifier lines, skipping blanks and `#` comments, keeping first occurrences
pub fn parse_identifier_list(content: &str) -> Vec<Identifier> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(Identifier::from)
        .collect()
}
