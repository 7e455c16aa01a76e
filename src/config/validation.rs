use crate::config::build::{build_crawl_rule, build_crawl_window};
use crate::config::types::{Config, CrawlerConfig, OaiConfig, StorageConfig, UnitConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
///
/// Missing or empty start / permission URL lists are accepted here: they are
/// reported as definition errors when a crawl of the unit asks for them.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_units(&config.units)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.daemon_permission_checkers.is_empty() {
        return Err(ConfigError::Validation(
            "daemon-permission-checkers cannot be empty".to_string(),
        ));
    }

    for pattern in &config.globally_permitted_hosts {
        validate_host_pattern(pattern)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates unit entries
fn validate_units(units: &[UnitConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for unit in units {
        if unit.id.trim().is_empty() {
            return Err(ConfigError::Validation("Unit id cannot be empty".to_string()));
        }
        if !seen.insert(unit.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate unit id '{}'",
                unit.id
            )));
        }

        for url in unit.start_urls.iter().flatten() {
            validate_http_url(url, "start URL", &unit.id)?;
        }
        for url in unit.permission_urls.iter().flatten() {
            validate_http_url(url, "permission URL", &unit.id)?;
        }

        if let Some(path) = &unit.per_host_permission_path {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(ConfigError::Validation(format!(
                    "Per-host permission path must be an absolute path on the host: {}",
                    path
                )));
            }
        }

        for pattern in &unit.permitted_host_patterns {
            validate_host_pattern(pattern)?;
        }

        if let Some(statement) = &unit.plugin_permission_statement {
            if statement.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Unit '{}' has an empty plugin-permission-statement",
                    unit.id
                )));
            }
        }

        build_crawl_rule(&unit.rules)?;

        if let Some(window) = &unit.window {
            build_crawl_window(window)?;
        }

        if let Some(translation) = &unit.ram_translation {
            if translation.from.is_empty() || translation.to.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Unit '{}' has an empty ram-translation prefix",
                    unit.id
                )));
            }
        }

        if let Some(oai) = &unit.oai {
            validate_oai(oai, &unit.id)?;
        }
    }

    Ok(())
}

fn validate_http_url(url: &str, what: &str, unit_id: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid {} '{}' in unit '{}': {}", what, url, unit_id, e))
    })?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' in unit '{}' must use http or https",
            what, url, unit_id
        )));
    }

    Ok(())
}

fn validate_oai(oai: &OaiConfig, unit_id: &str) -> Result<(), ConfigError> {
    validate_http_url(&oai.base_url, "OAI base URL", unit_id)?;
    if oai.metadata_prefix.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Unit '{}' has an empty OAI metadata-prefix",
            unit_id
        )));
    }
    Ok(())
}

/// Validates a host pattern (supports wildcards)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    if pattern == "*" {
        return Ok(());
    }

    // Check if it's a wildcard pattern
    if let Some(host) = pattern.strip_prefix("*.") {
        validate_host_string(host)
    } else {
        validate_host_string(pattern)
    }
}

/// Validates a host name (without wildcard prefix)
fn validate_host_string(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host cannot be empty".to_string(),
        ));
    }

    // Check for invalid characters
    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    // Check that it doesn't start or end with a dot or hyphen
    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-') {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    // Check for consecutive dots
    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let (local, domain) = (parts[0], parts[1]);
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}
