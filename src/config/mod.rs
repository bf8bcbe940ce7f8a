//! Configuration module for Listing-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the opaque crawl inputs (bounding boxes and identifier lists).
//!
//! # Example
//!
//! ```no_run
//! use listing_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Walking at most {} search pages", config.crawler.max_pages);
//! ```

mod inputs;
mod parser;
mod types;
mod validation;

pub use inputs::{
    bbox_from_url, load_bbox, load_identifier_list, parse_identifier_list, save_bbox,
    BoundingBox,
};
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use types::{Config, CrawlerConfig, OutputConfig, SourceConfig};
pub use validation::ID_PLACEHOLDER;
