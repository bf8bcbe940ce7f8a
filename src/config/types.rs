use serde::Deserialize;

/// Main configuration structure for Listing-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

/// Crawl pacing and concurrency configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of detail fetches in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent")]
    pub max_concurrent_fetches: u32,

    /// Lower bound of the randomized interval between outbound calls (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized interval between outbound calls (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Lower bound of the pause after each completed item (milliseconds)
    #[serde(rename = "item-delay-min-ms", default = "default_item_delay_min")]
    pub item_delay_min_ms: u64,

    /// Upper bound of the pause after each completed item (milliseconds)
    #[serde(rename = "item-delay-max-ms", default = "default_item_delay_max")]
    pub item_delay_max_ms: u64,

    /// Pause applied to the host after an HTTP 429 (milliseconds)
    #[serde(rename = "rate-limit-cooldown-ms", default = "default_cooldown")]
    pub rate_limit_cooldown_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of search pages walked per run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Retries for transient fetch failures (timeouts, connection errors, 5xx)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            item_delay_min_ms: default_item_delay_min(),
            item_delay_max_ms: default_item_delay_max(),
            rate_limit_cooldown_ms: default_cooldown(),
            request_timeout_secs: default_timeout(),
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
        }
    }
}

/// Remote marketplace endpoints and request identity
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Cursor-paginated search endpoint
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// Single-shot bounding-box endpoint
    #[serde(rename = "viewport-url")]
    pub viewport_url: String,

    /// Detail page URL template; `{id}` is replaced by the identifier
    #[serde(rename = "detail-url")]
    pub detail_url: String,

    /// Structured detail payload URL template; `{id}` is replaced by the identifier
    #[serde(rename = "payload-url", default)]
    pub payload_url: Option<String>,

    /// City scope for search queries
    #[serde(rename = "city-ids")]
    pub city_ids: Vec<String>,

    /// Listing category for search queries
    #[serde(default = "default_category")]
    pub category: String,

    /// User agents rotated across requests
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    /// Optional HTTP(S) proxy for every request
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Downstream collaborators
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Base URL of the search index; indexing is disabled when absent
    #[serde(rename = "search-index-url", default)]
    pub search_index_url: Option<String>,

    #[serde(rename = "search-index-name", default = "default_index_name")]
    pub search_index_name: String,

    /// Base URL of the object storage; image re-hosting is disabled when absent
    #[serde(rename = "object-storage-url", default)]
    pub object_storage_url: Option<String>,

    #[serde(rename = "object-storage-bucket", default = "default_bucket")]
    pub object_storage_bucket: String,

    #[serde(rename = "object-storage-key", default)]
    pub object_storage_key: Option<String>,

    /// Maximum number of images re-hosted per listing
    #[serde(rename = "max-images", default = "default_max_images")]
    pub max_images: usize,

    /// Directory receiving one JSON file per emitted record
    #[serde(rename = "json-dir", default)]
    pub json_dir: Option<String>,
}

fn default_max_concurrent() -> u32 {
    3
}

fn default_min_delay() -> u64 {
    2000
}

fn default_max_delay() -> u64 {
    5000
}

fn default_item_delay_min() -> u64 {
    1000
}

fn default_item_delay_max() -> u64 {
    3000
}

fn default_cooldown() -> u64 {
    10_000
}

fn default_timeout() -> u64 {
    20
}

fn default_max_pages() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    1
}

fn default_category() -> String {
    "residential-sell".to_string()
}

fn default_index_name() -> String {
    "listings".to_string()
}

fn default_bucket() -> String {
    "property-images".to_string()
}

fn default_max_images() -> usize {
    5
}
