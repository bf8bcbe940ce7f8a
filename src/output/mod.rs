//! Output module for downstream sinks and run reporting
//!
//! This module handles:
//! - Indexing canonical records into a search index
//! - Re-hosting listing images into object storage
//! - Recording crawl statistics

mod object_storage;
mod search_index;
pub mod stats;

pub use object_storage::{select_images, HttpObjectStorage, ObjectStorage};
pub use search_index::{build_document, HttpSearchIndex, SearchIndex};
pub use stats::{print_stats, CrawlStats, ItemOutcome};

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// User agent the sinks identify themselves with
pub const SINK_USER_AGENT: &str = concat!("listing-harvest/", env!("CARGO_PKG_VERSION"));

/// Builds the client shared by the search index and object storage sinks
///
/// Unlike the marketplace client it carries no browser headers, so no
/// marketplace Referer or Origin reaches the downstream services.
pub fn build_sink_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(SINK_USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .build()
}

/// Errors raised by the HTTP sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Maps a non-success response to [`SinkError::Status`]
pub(crate) fn check_status(response: reqwest::Response) -> SinkResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SinkError::Status(status.as_u16()))
    }
}
