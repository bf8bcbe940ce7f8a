//! Storage traits and error types
//!
//! This module defines the trait interface for the persistence collaborator
//! and associated error types.

use crate::model::CanonicalRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::Serialization(error.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence collaborator for canonical records
///
/// Implementations must be idempotent per identifier: writing the same
/// record twice leaves one stored listing.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Inserts or updates the record keyed by its identifier
    ///
    /// # Returns
    ///
    /// * `Ok(Some(id))` - The stored row id
    /// * `Ok(None)` - A duplicate-key conflict, treated as a successful no-op
    /// * `Err(StorageError)` - The write failed
    async fn upsert(&self, record: &CanonicalRecord) -> StorageResult<Option<i64>>;

    /// Attaches re-hosted image URLs to a stored listing, in order
    async fn attach_images(&self, listing_id: i64, public_urls: &[String]) -> StorageResult<()>;
}
