//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Listing-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    stats TEXT
);

-- One row per listing, keyed by its marketplace identifier
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    latitude REAL,
    longitude REAL,
    price NUMERIC,
    price_per_meter NUMERIC,
    area NUMERIC,
    land_area NUMERIC,
    year_built NUMERIC,
    bedrooms NUMERIC,
    property_type TEXT,
    floor_info TEXT,
    title_deed_type TEXT,
    building_direction TEXT,
    renovation_status TEXT,
    floor_material TEXT,
    bathroom_type TEXT,
    cooling_system TEXT,
    heating_system TEXT,
    hot_water_system TEXT,
    has_parking INTEGER NOT NULL DEFAULT 0,
    has_storage INTEGER NOT NULL DEFAULT 0,
    has_balcony INTEGER NOT NULL DEFAULT 0,
    attributes TEXT NOT NULL DEFAULT '[]',
    image_urls TEXT NOT NULL DEFAULT '[]',
    scraped_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_listings_property_type ON listings(property_type);

-- Re-hosted images attached to a listing
CREATE TABLE IF NOT EXISTS listing_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    listing_id INTEGER NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    public_url TEXT NOT NULL,
    UNIQUE(listing_id, public_url)
);

CREATE INDEX IF NOT EXISTS idx_listing_images_listing ON listing_images(listing_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
