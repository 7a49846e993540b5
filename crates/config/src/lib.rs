//! Tally Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tally_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[query]\ndatabase = \"balance\"").unwrap();
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [query]
//! url = "http://localhost:8123"
//! database = "balance"
//!
//! [api_server]
//! port = 3000
//!
//! [analytics]
//! registry_file = "configs/registry.toml"
//! ```

mod analytics;
mod api_server;
mod error;
mod logging;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use analytics::AnalyticsConfig;
pub use api_server::ApiServerConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use tally_query::ClickHouseBackendConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// ClickHouse connection used for analytics queries
    pub query: ClickHouseBackendConfig,

    /// HTTP API server
    pub api_server: ApiServerConfig,

    /// Metric registry source
    pub analytics: AnalyticsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut config = Self::from_str(&contents)?;

        // A relative registry path is relative to the config file
        if let Some(registry) = config.analytics.registry_file.as_mut()
            && registry.is_relative()
            && let Some(dir) = path.parent()
        {
            *registry = dir.join(&*registry);
        }

        Ok(config)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::str::FromStr;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.query.url, "http://localhost:8123");
        assert_eq!(config.api_server.port, 3000);
        assert!(config.analytics.registry_file.is_none());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[query]
url = "https://ch.example.com:8443"
database = "balance"
username = "reader"
password = "secret"
max_execution_time = 30
request_timeout = 45

[api_server]
host = "127.0.0.1"
port = 8080
cors_origins = ["https://app.example.com"]

[analytics]
registry_file = "/etc/tally/registry.toml"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.query.database, "balance");
        assert_eq!(config.query.username.as_deref(), Some("reader"));
        assert_eq!(config.query.max_execution_time, 30);
        assert_eq!(config.api_server.port, 8080);
        assert_eq!(config.api_server.cors_origins.len(), 1);
        assert_eq!(
            config.analytics.registry_file,
            Some(PathBuf::from("/etc/tally/registry.toml"))
        );
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file_resolves_relative_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[analytics]\nregistry_file = \"registry.toml\"").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.analytics.registry_file,
            Some(dir.path().join("registry.toml"))
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/tally.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(err.to_string().contains("/nonexistent/tally.toml"));
    }
}
