//! Configuration validation
//!
//! Validates config consistency:
//! - The query backend has a usable URL and database
//! - Timeouts are non-zero and the client outlives the server-side limit
//! - The API server binds to a valid address
//! - CORS origins are non-empty

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_query(config)?;
    validate_api_server(config)?;
    validate_analytics(config)?;
    Ok(())
}

/// Validate the ClickHouse connection settings
fn validate_query(config: &Config) -> Result<()> {
    let query = &config.query;

    if query.url.trim().is_empty() {
        return Err(ConfigError::missing_field("query", "url"));
    }
    if !query.url.starts_with("http://") && !query.url.starts_with("https://") {
        return Err(ConfigError::invalid_value(
            "query",
            "url",
            format!("'{}' must start with http:// or https://", query.url),
        ));
    }
    if query.database.trim().is_empty() {
        return Err(ConfigError::missing_field("query", "database"));
    }
    if query.username.is_some() != query.password.is_some() {
        return Err(ConfigError::invalid_value(
            "query",
            "username",
            "username and password must be set together",
        ));
    }
    if query.max_execution_time == 0 {
        return Err(ConfigError::invalid_value(
            "query",
            "max_execution_time",
            "must be greater than 0",
        ));
    }
    if query.request_timeout < query.max_execution_time {
        return Err(ConfigError::invalid_value(
            "query",
            "request_timeout",
            format!(
                "{}s is shorter than max_execution_time ({}s)",
                query.request_timeout, query.max_execution_time
            ),
        ));
    }

    Ok(())
}

/// Validate the API server settings
fn validate_api_server(config: &Config) -> Result<()> {
    let api = &config.api_server;

    if api.host.trim().is_empty() {
        return Err(ConfigError::missing_field("api_server", "host"));
    }
    if api.port == 0 {
        return Err(ConfigError::invalid_value(
            "api_server",
            "port",
            "must be greater than 0",
        ));
    }
    if api.bind_addr().is_none() {
        return Err(ConfigError::invalid_value(
            "api_server",
            "host",
            format!("'{}' is not an IP address", api.host),
        ));
    }
    if api.cors_origins.iter().any(|o| o.trim().is_empty()) {
        return Err(ConfigError::invalid_value(
            "api_server",
            "cors_origins",
            "origins must not be empty",
        ));
    }

    Ok(())
}

/// Validate the analytics settings
fn validate_analytics(config: &Config) -> Result<()> {
    if let Some(ref path) = config.analytics.registry_file
        && path.as_os_str().is_empty()
    {
        return Err(ConfigError::invalid_value(
            "analytics",
            "registry_file",
            "path must not be empty",
        ));
    }
    Ok(())
}
