//! Analytics configuration
//!
//! Where the metric registry comes from.

use std::path::PathBuf;

use serde::Deserialize;

/// Analytics configuration
///
/// Without a `registry_file` the built-in balance-sheet registry is used.
///
/// # Example
///
/// ```toml
/// [analytics]
/// registry_file = "configs/registry.toml"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// TOML file declaring tables, metrics and dimensions
    pub registry_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_builtin_registry() {
        let config: AnalyticsConfig = toml::from_str("").unwrap();
        assert!(config.registry_file.is_none());
    }

    #[test]
    fn test_registry_file() {
        let config: AnalyticsConfig =
            toml::from_str("registry_file = \"/etc/tally/registry.toml\"").unwrap();
        assert_eq!(
            config.registry_file,
            Some(PathBuf::from("/etc/tally/registry.toml"))
        );
    }
}
