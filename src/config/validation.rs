use crate::config::types::{ConfigFile, CrawlConfig, ExtractionRule};
use crate::url::normalize_url;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates a loaded config file (crawl settings + rule set)
pub fn validate(config: &ConfigFile) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_rules(&config.rules)?;

    if let Some(seed) = &config.seed {
        validate_seed(seed)?;
    }

    Ok(())
}

/// Validates crawl settings
///
/// These are the checks `start_crawl` runs synchronously; a run never
/// starts with an invalid configuration.
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_body_bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    for host in &config.allowed_hosts {
        validate_host_string(host)?;
    }

    Ok(())
}

/// Validates an extraction rule set
///
/// Field names must be unique within the set and neither field names nor
/// selectors may be empty. Whether a selector actually parses is checked
/// lazily at evaluation time, where a bad selector fails only its own
/// field.
pub fn validate_rules(rules: &[ExtractionRule]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for rule in rules {
        if rule.field_name.trim().is_empty() {
            return Err(ConfigError::InvalidRule {
                field: rule.field_name.clone(),
                message: "field name cannot be empty".to_string(),
            });
        }

        if rule.selector.trim().is_empty() {
            return Err(ConfigError::InvalidRule {
                field: rule.field_name.clone(),
                message: "selector cannot be empty".to_string(),
            });
        }

        if !seen.insert(rule.field_name.as_str()) {
            return Err(ConfigError::InvalidRule {
                field: rule.field_name.clone(),
                message: "duplicate field name in rule set".to_string(),
            });
        }
    }

    Ok(())
}

/// Validates and normalizes a seed URL
pub fn validate_seed(seed: &str) -> Result<Url, ConfigError> {
    normalize_url(seed).map_err(|e| ConfigError::InvalidSeed(format!("'{}': {}", seed, e)))
}

/// Validates a host string from the allow-list
fn validate_host_string(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "allowed host cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "allowed host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::Validation(format!(
            "allowed host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::Validation(format!(
            "allowed host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}
