use crate::config::types::{Config, CrawlerConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use url::Url;

/// Placeholder replaced by the listing identifier in URL templates
pub const ID_PLACEHOLDER: &str = "{id}";

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_source_config(&config.source)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler pacing configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 32, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.item_delay_min_ms > config.item_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "item_delay_min_ms ({}) must not exceed item_delay_max_ms ({})",
            config.item_delay_min_ms, config.item_delay_max_ms
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be between 1 and 120, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates remote endpoint configuration
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    validate_http_url("search_url", &config.search_url)?;
    validate_http_url("viewport_url", &config.viewport_url)?;
    validate_template("detail_url", &config.detail_url)?;

    if let Some(payload_url) = &config.payload_url {
        validate_template("payload_url", payload_url)?;
    }

    if config.city_ids.is_empty() || config.city_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "city_ids must contain at least one non-empty city id".to_string(),
        ));
    }

    if config.category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "category cannot be empty".to_string(),
        ));
    }

    if config.user_agents.is_empty() || config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one non-empty entry".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        validate_http_url("proxy", proxy)?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if let Some(url) = &config.search_index_url {
        validate_http_url("search_index_url", url)?;
        if config.search_index_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "search_index_name cannot be empty".to_string(),
            ));
        }
    }

    if let Some(url) = &config.object_storage_url {
        validate_http_url("object_storage_url", url)?;
        if config.object_storage_bucket.trim().is_empty() {
            return Err(ConfigError::Validation(
                "object_storage_bucket cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates an absolute HTTP(S) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

/// Validates a URL template that must contain the identifier placeholder
fn validate_template(field: &str, template: &str) -> Result<(), ConfigError> {
    if !template.contains(ID_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must contain the {} placeholder",
            field, template, ID_PLACEHOLDER
        )));
    }

    validate_http_url(field, &template.replace(ID_PLACEHOLDER, "sample"))
}
