//! HTTP fetcher implementation
//!
//! This module handles all detail requests for the crawler, including:
//! - Building HTTP clients with browser-like default headers and optional proxy
//! - User-agent rotation per request
//! - Fetching the detail page markup and structured payload
//! - Error classification into [`FetchError`]

use crate::config::{SourceConfig, ID_PLACEHOLDER};
use crate::model::{Identifier, RawDetailDocument};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Proxy, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Failure of a single remote fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited by remote host")]
    RateLimited,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether a retry may succeed (timeouts, connection failures, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::HttpStatus(code) => (500..600).contains(code),
            FetchError::RateLimited | FetchError::Malformed(_) => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }

    /// Classifies a transport-level reqwest error
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = error.status() {
            FetchError::from_status(status)
        } else if error.is_decode() {
            FetchError::Malformed(error.to_string())
        } else {
            FetchError::Network(error.to_string())
        }
    }

    /// Maps a non-success status code
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            FetchError::RateLimited
        } else {
            FetchError::HttpStatus(status.as_u16())
        }
    }
}

/// Source of raw detail documents
///
/// The dispatcher only depends on this trait, so tests can substitute an
/// instrumented in-memory source.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch(&self, identifier: &Identifier) -> Result<RawDetailDocument, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `source` - The remote source configuration (proxy, referer origin)
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. invalid proxy)
///
/// # Example
///
/// ```no_run
/// use listing_harvest::config::load_config;
/// use listing_harvest::crawler::build_http_client;
/// use std::path::Path;
/// use std::time::Duration;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// let client = build_http_client(&config.source, Duration::from_secs(20)).unwrap();
/// ```
pub fn build_http_client(source: &SourceConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .default_headers(default_headers(source))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &source.proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Accept, language and Referer/Origin headers sent with every request
fn default_headers(source: &SourceConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/html;q=0.9, */*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("fa-IR,fa;q=0.9,en-US;q=0.8,en;q=0.7"),
    );

    let origin = Url::parse(&render_template(&source.detail_url, "origin"))
        .ok()
        .map(|url| url.origin().ascii_serialization())
        .filter(|origin| origin != "null");

    if let Some(origin) = origin {
        if let Ok(value) = HeaderValue::from_str(&format!("{}/", origin)) {
            headers.insert(header::REFERER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(header::ORIGIN, value);
        }
    }

    headers
}

/// Picks a random user agent; `None` when the list is empty
pub fn pick_user_agent(user_agents: &[String]) -> Option<&str> {
    if user_agents.is_empty() {
        return None;
    }
    Some(user_agents[fastrand::usize(..user_agents.len())].as_str())
}

/// Substitutes an identifier into a URL template
///
/// The identifier is form-encoded so it cannot escape its path segment.
pub fn render_template(template: &str, identifier: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(identifier.as_bytes()).collect();
    template.replace(ID_PLACEHOLDER, &encoded)
}

/// Attaches a rotated user agent to a request
pub fn with_user_agent(
    request: reqwest::RequestBuilder,
    user_agents: &[String],
) -> reqwest::RequestBuilder {
    match pick_user_agent(user_agents) {
        Some(agent) => request.header(header::USER_AGENT, agent),
        None => request,
    }
}

/// Sends a request and maps transport errors and non-2xx statuses
pub async fn send_checked(request: reqwest::RequestBuilder) -> Result<Response, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(&e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::from_status(status));
    }
    Ok(response)
}

/// Detail source backed by the marketplace's web page and payload API
pub struct HttpDetailSource {
    client: Client,
    detail_url: String,
    payload_url: Option<String>,
    user_agents: Vec<String>,
}

impl HttpDetailSource {
    pub fn new(client: Client, source: &SourceConfig) -> Self {
        Self {
            client,
            detail_url: source.detail_url.clone(),
            payload_url: source.payload_url.clone(),
            user_agents: source.user_agents.clone(),
        }
    }

    async fn fetch_markup(&self, url: &str) -> Result<String, FetchError> {
        let request = with_user_agent(self.client.get(url), &self.user_agents);
        let response = send_checked(request).await?;
        response.text().await.map_err(|e| FetchError::from_reqwest(&e))
    }

    /// Fetches the structured payload; only a rate-limit signal is fatal
    async fn fetch_payload(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<serde_json::Value>, FetchError> {
        let Some(template) = &self.payload_url else {
            return Ok(None);
        };
        let url = render_template(template, identifier.as_str());
        let request = with_user_agent(self.client.get(&url), &self.user_agents);

        let response = match send_checked(request).await {
            Ok(response) => response,
            Err(FetchError::RateLimited) => return Err(FetchError::RateLimited),
            Err(e) => {
                tracing::warn!(id = %identifier, "Payload fetch failed: {}", e);
                return Ok(None);
            }
        };

        match response.json::<serde_json::Value>().await {
            Ok(payload) => Ok(Some(payload)),
            Err(e) => {
                tracing::warn!(id = %identifier, "Dropping undecodable payload: {}", e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl DetailSource for HttpDetailSource {
    async fn fetch(&self, identifier: &Identifier) -> Result<RawDetailDocument, FetchError> {
        let url = render_template(&self.detail_url, identifier.as_str());
        tracing::debug!(id = %identifier, "Fetching detail page {}", url);

        let markup = self.fetch_markup(&url).await?;
        let payload = self.fetch_payload(identifier).await?;

        Ok(RawDetailDocument {
            identifier: identifier.clone(),
            markup: Some(markup),
            payload,
            url: Some(url),
        })
    }
}
