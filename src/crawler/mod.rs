//! Crawler module for listing discovery and detail processing
//!
//! This module contains the core crawling logic, including:
//! - Listing discovery (cursor-paginated search, viewport queries)
//! - HTTP detail fetching with error classification
//! - Request pacing and rate-limit cooldown
//! - Bounded, deduplicating dispatch of identifiers

mod discovery;
mod dispatcher;
mod fetcher;
mod limiter;

pub use discovery::{
    parse_search_page, parse_viewport_response, Cursor, DiscoveryPage, ListingDiscovery,
};
pub use dispatcher::{Dispatcher, DispatcherSettings, Sinks};
pub use fetcher::{
    build_http_client, pick_user_agent, render_template, DetailSource, FetchError,
    HttpDetailSource,
};
pub use limiter::{random_between, RateLimiter, SharedLimiter};
