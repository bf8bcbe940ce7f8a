//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the [`ListingStore`] trait.

use crate::model::{AttributeEntry, CanonicalRecord, Identifier, Number};
use crate::output::CrawlStats;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const UPSERT_SQL: &str = "
    INSERT INTO listings (
        identifier, title, description, latitude, longitude,
        price, price_per_meter, area, land_area, year_built, bedrooms,
        property_type, floor_info, title_deed_type, building_direction,
        renovation_status, floor_material, bathroom_type, cooling_system,
        heating_system, hot_water_system, has_parking, has_storage, has_balcony,
        attributes, image_urls, scraped_at, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
        ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
    )
    ON CONFLICT(identifier) DO UPDATE SET
        title = excluded.title,
        description = excluded.description,
        latitude = excluded.latitude,
        longitude = excluded.longitude,
        price = excluded.price,
        price_per_meter = excluded.price_per_meter,
        area = excluded.area,
        land_area = excluded.land_area,
        year_built = excluded.year_built,
        bedrooms = excluded.bedrooms,
        property_type = excluded.property_type,
        floor_info = excluded.floor_info,
        title_deed_type = excluded.title_deed_type,
        building_direction = excluded.building_direction,
        renovation_status = excluded.renovation_status,
        floor_material = excluded.floor_material,
        bathroom_type = excluded.bathroom_type,
        cooling_system = excluded.cooling_system,
        heating_system = excluded.heating_system,
        hot_water_system = excluded.hot_water_system,
        has_parking = excluded.has_parking,
        has_storage = excluded.has_storage,
        has_balcony = excluded.has_balcony,
        attributes = excluded.attributes,
        image_urls = excluded.image_urls,
        scraped_at = excluded.scraped_at,
        updated_at = excluded.updated_at
    RETURNING id
";

const SELECT_LISTING_SQL: &str = "
    SELECT identifier, title, description, latitude, longitude,
           price, price_per_meter, area, land_area, year_built, bedrooms,
           property_type, floor_info, title_deed_type, building_direction,
           renovation_status, floor_material, bathroom_type, cooling_system,
           heating_system, hot_water_system, has_parking, has_storage, has_balcony,
           attributes, image_urls, scraped_at
    FROM listings WHERE identifier = ?1
";

/// SQLite storage backend
///
/// The connection sits behind a blocking mutex; no lock is held across an
/// await point.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Marks a run as finished with a status and its final counters
    pub fn complete_run(
        &self,
        run_id: i64,
        status: RunStatus,
        stats: &CrawlStats,
    ) -> StorageResult<()> {
        let stats = serde_json::to_string(stats)?;
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stats = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, stats, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, started_at, finished_at, config_hash, status, stats FROM runs WHERE id = ?1",
            params![run_id],
            |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                    stats: row.get(5)?,
                })
            },
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    // ===== Listings =====

    /// Loads a stored listing by identifier
    pub fn get_listing(&self, identifier: &Identifier) -> StorageResult<Option<CanonicalRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(SELECT_LISTING_SQL, params![identifier.as_str()], StoredRow::from_row)
            .optional()?;

        raw.map(StoredRow::into_record).transpose()
    }

    /// Counts stored listings
    pub fn count_listings(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Re-hosted image URLs of a listing, in attachment order
    pub fn list_images(&self, listing_id: i64) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT public_url FROM listing_images WHERE listing_id = ?1 ORDER BY position",
        )?;
        let urls = stmt
            .query_map(params![listing_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn upsert(&self, record: &CanonicalRecord) -> StorageResult<Option<i64>> {
        let attributes = serde_json::to_string(&record.attributes)?;
        let image_urls = serde_json::to_string(&record.image_urls)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        let result = conn.query_row(
            UPSERT_SQL,
            params![
                record.identifier.as_str(),
                record.title,
                record.description,
                record.latitude,
                record.longitude,
                number_to_sql(record.price),
                number_to_sql(record.price_per_meter),
                number_to_sql(record.area),
                number_to_sql(record.land_area),
                number_to_sql(record.year_built),
                number_to_sql(record.bedrooms),
                record.property_type,
                record.floor_info,
                record.title_deed_type,
                record.building_direction,
                record.renovation_status,
                record.floor_material,
                record.bathroom_type,
                record.cooling_system,
                record.heating_system,
                record.hot_water_system,
                record.has_parking,
                record.has_storage,
                record.has_balcony,
                attributes,
                image_urls,
                record.scraped_at.to_rfc3339(),
                now,
            ],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                tracing::warn!(
                    id = %record.identifier,
                    "Upsert hit a constraint, treating as no-op: {}",
                    message.unwrap_or_default()
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn attach_images(&self, listing_id: i64, public_urls: &[String]) -> StorageResult<()> {
        let image_urls = serde_json::to_string(public_urls)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM listing_images WHERE listing_id = ?1",
            params![listing_id],
        )?;
        for (position, url) in public_urls.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO listing_images (listing_id, position, public_url) VALUES (?1, ?2, ?3)",
                params![listing_id, position as i64, url],
            )?;
        }
        tx.execute(
            "UPDATE listings SET image_urls = ?1 WHERE id = ?2",
            params![image_urls, listing_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Numbers keep their integer/float distinction in NUMERIC columns
fn number_to_sql(number: Option<Number>) -> Value {
    match number {
        Some(Number::Int(v)) => Value::Integer(v),
        Some(Number::Float(v)) => Value::Real(v),
        None => Value::Null,
    }
}

fn number_from_sql(value: Value) -> Option<Number> {
    match value {
        Value::Integer(v) => Some(Number::Int(v)),
        Value::Real(v) => Number::from_f64(v),
        _ => None,
    }
}

/// Column values of one listing row before JSON decoding
struct StoredRow {
    identifier: String,
    title: String,
    description: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    numbers: [Value; 6],
    texts: [Option<String>; 10],
    flags: [bool; 3],
    attributes: String,
    image_urls: String,
    scraped_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            identifier: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            numbers: [
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
            ],
            texts: [
                row.get(11)?,
                row.get(12)?,
                row.get(13)?,
                row.get(14)?,
                row.get(15)?,
                row.get(16)?,
                row.get(17)?,
                row.get(18)?,
                row.get(19)?,
                row.get(20)?,
            ],
            flags: [row.get(21)?, row.get(22)?, row.get(23)?],
            attributes: row.get(24)?,
            image_urls: row.get(25)?,
            scraped_at: row.get(26)?,
        })
    }

    fn into_record(self) -> StorageResult<CanonicalRecord> {
        let attributes: Vec<AttributeEntry> = serde_json::from_str(&self.attributes)?;
        let image_urls: Vec<String> = serde_json::from_str(&self.image_urls)?;
        let scraped_at = DateTime::parse_from_rfc3339(&self.scraped_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        let [price, price_per_meter, area, land_area, year_built, bedrooms] =
            self.numbers.map(number_from_sql);
        let [property_type, floor_info, title_deed_type, building_direction, renovation_status, floor_material, bathroom_type, cooling_system, heating_system, hot_water_system] =
            self.texts;
        let [has_parking, has_storage, has_balcony] = self.flags;

        Ok(CanonicalRecord {
            identifier: Identifier::new(self.identifier),
            title: self.title,
            description: self.description,
            image_urls,
            latitude: self.latitude,
            longitude: self.longitude,
            price,
            price_per_meter,
            area,
            land_area,
            year_built,
            bedrooms,
            property_type,
            floor_info,
            title_deed_type,
            building_direction,
            renovation_status,
            floor_material,
            bathroom_type,
            cooling_system,
            heating_system,
            hot_water_system,
            has_parking,
            has_storage,
            has_balcony,
            attributes,
            scraped_at,
        })
    }
}
