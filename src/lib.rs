//! Listing-Harvest: a resilient listing extraction pipeline
//!
//! This crate discovers listing identifiers on a real-estate marketplace,
//! fetches each listing's detail document politely, recovers canonical fields
//! through ordered fallback strategies and assembles validated records for
//! downstream storage and search.

pub mod assemble;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Listing-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Listing-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use assemble::{assemble, ValidationError};
pub use config::Config;
pub use crawler::{Dispatcher, FetchError, RateLimiter};
pub use extract::extract_fields;
pub use model::{AttributeEntry, CanonicalRecord, ExtractedFields, Identifier, Number};
pub use normalize::{classify_property, parse_number, PropertyCategory};
