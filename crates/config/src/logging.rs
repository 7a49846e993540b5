//! Logging configuration
//!
//! The level applies to Tally's own crates. HTTP and runtime dependencies
//! (hyper, reqwest, tower) stay at `warn` so request-level debug output is
//! not drowned out.

use std::str::FromStr;

use serde::Deserialize;

/// Tally crates that receive the configured level
const TALLY_TARGETS: &[&str] = &[
    "tally",
    "tally_analytics",
    "tally_api",
    "tally_config",
    "tally_query",
];

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose
    Trace,
    /// Built SQL shape per request (skipped tables, calculated metrics, bound
    /// parameters) and each backend round trip
    Debug,
    /// Startup, registry loading, server address
    #[default]
    Info,
    /// Registry diagnostics and rejected requests
    Warn,
    /// Unreachable backend, server failures
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// `EnvFilter` directive: this level for Tally crates, `warn` (or
    /// quieter) for everything else
    pub fn filter_directive(&self) -> String {
        let default = match self {
            Self::Error => "error",
            _ => "warn",
        };

        let mut directive = default.to_string();
        for target in TALLY_TARGETS {
            directive.push_str(&format!(",{}={}", target, self.as_str()));
        }
        directive
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines on stderr (default)
    #[default]
    Console,
    /// One JSON object per event on stderr, fields included
    Json,
}

/// `[log]` section
///
/// ```toml
/// [log]
/// level = "debug"   # show generated SQL for each request
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Console);
    }

    #[test]
    fn test_deserialize() {
        let config: LogConfig = toml::from_str("level = \"debug\"\nformat = \"json\"").unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);

        assert!(toml::from_str::<LogConfig>("level = \"loud\"").is_err());
    }

    #[test]
    fn test_filter_directive_scopes_level_to_tally_crates() {
        let directive = LogLevel::Debug.filter_directive();
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("tally_analytics=debug"));
        assert!(directive.contains("tally_query=debug"));
        assert!(!directive.contains("hyper"));
    }

    #[test]
    fn test_filter_directive_error_quiets_dependencies() {
        assert!(LogLevel::Error.filter_directive().starts_with("error,tally=error"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" trace ".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert!("tally_api=debug".parse::<LogLevel>().is_err());
    }
}
