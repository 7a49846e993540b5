//! API server configuration
//!
//! Configuration for the Tally HTTP API.

use std::net::SocketAddr;

use serde::Deserialize;

/// API server configuration
///
/// # Example
///
/// ```toml
/// [api_server]
/// host = "0.0.0.0"                          # default
/// port = 3000                               # default
/// cors_origins = ["https://app.example.com"] # default: none
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// Host to bind to
    /// Default: "0.0.0.0"
    pub host: String,

    /// Port to listen on
    /// Default: 3000
    pub port: u16,

    /// Origins allowed to call the API from a browser
    /// Default: none (CORS disabled). `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiServerConfig {
    /// Socket address to bind, if host and port form one
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().ok()
    }

    /// Whether any origin is allowed
    pub fn cors_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.bind_addr(), Some("0.0.0.0:3000".parse().unwrap()));
    }

    #[test]
    fn test_custom() {
        let toml = r#"
host = "127.0.0.1"
port = 8080
cors_origins = ["*"]
"#;
        let config: ApiServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_addr(), Some("127.0.0.1:8080".parse().unwrap()));
        assert!(config.cors_any_origin());
    }

    #[test]
    fn test_unparseable_host() {
        let config = ApiServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.bind_addr().is_none());
    }
}
