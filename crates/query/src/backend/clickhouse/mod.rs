//! ClickHouse backend for querying analytics data
//!
//! Executes SQL against a ClickHouse database using the HTTP interface. The
//! statement is sent as the request body; bound parameters travel as
//! `param_<name>` query-string entries and ClickHouse substitutes them into
//! the `{name:Type}` placeholders server-side.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{QueryBackend, validate_params, validate_sql};
use crate::error::QueryError;
use crate::params::QueryParams;
use crate::result::{QueryResult, Record};

// =============================================================================
// Configuration
// =============================================================================

/// ClickHouse backend configuration
///
/// # Example
///
/// ```toml
/// [query]
/// url = "http://localhost:8123"
/// database = "balance"
/// username = "reader"
/// password = "secret"
/// max_execution_time = 30
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClickHouseBackendConfig {
    /// ClickHouse HTTP URL (e.g., "http://localhost:8123")
    pub url: String,

    /// Database name
    pub database: String,

    /// Username for authentication (optional)
    pub username: Option<String>,

    /// Password for authentication (optional)
    pub password: Option<String>,

    /// Server-side max execution time in seconds
    pub max_execution_time: u64,

    /// Client-side request timeout in seconds
    pub request_timeout: u64,
}

impl Default for ClickHouseBackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".into(),
            database: "default".into(),
            username: None,
            password: None,
            max_execution_time: 60,
            request_timeout: 90,
        }
    }
}

impl ClickHouseBackendConfig {
    /// Create a new config with URL and database
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Set authentication credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), QueryError> {
        reqwest::Url::parse(&self.url)
            .map_err(|e| QueryError::Config(format!("invalid ClickHouse url '{}': {}", self.url, e)))?;

        if self.database.trim().is_empty() {
            return Err(QueryError::Config("database must not be empty".to_string()));
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(QueryError::Config(
                "username and password must be set together".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Backend Implementation
// =============================================================================

/// ClickHouse backend for SQL queries using HTTP interface
#[derive(Clone)]
pub struct ClickHouseBackend {
    client: reqwest::Client,
    config: ClickHouseBackendConfig,
}

impl std::fmt::Debug for ClickHouseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseBackend")
            .field("url", &self.config.url)
            .field("database", &self.config.database)
            .finish()
    }
}

impl ClickHouseBackend {
    /// Create a new ClickHouse backend from config
    pub fn new(config: &ClickHouseBackendConfig) -> Result<Self, QueryError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| QueryError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Create from URL and database directly
    pub fn from_url(
        url: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let config = ClickHouseBackendConfig::new(url, database);
        Self::new(&config)
    }

    /// Build the request URL with settings and bound parameters
    fn build_url(&self, params: &QueryParams) -> Result<reqwest::Url, QueryError> {
        let mut url = reqwest::Url::parse(&self.config.url)
            .map_err(|e| QueryError::Config(format!("invalid ClickHouse url: {}", e)))?;

        {
            let mut qs = url.query_pairs_mut();
            qs.append_pair("database", &self.config.database);
            qs.append_pair(
                "max_execution_time",
                &self.config.max_execution_time.to_string(),
            );
            // Emit 64-bit integers as JSON numbers rather than quoted strings
            qs.append_pair("output_format_json_quote_64bit_integers", "0");
            // Metric aliases may reuse the name of the column they aggregate
            qs.append_pair("prefer_column_name_to_alias", "1");
            for param in params.iter() {
                qs.append_pair(&format!("param_{}", param.name), &param.value);
            }
        }

        Ok(url)
    }

    /// Execute a statement and get the raw response body
    async fn execute_query(&self, sql: &str, params: &QueryParams) -> Result<String, QueryError> {
        let url = self.build_url(params)?;

        let mut request = self.client.post(url).body(sql.to_string());

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await.map_err(|e| {
            QueryError::Connection(format!("ClickHouse connection failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Execution(format!(
                "ClickHouse error ({}): {}",
                status, body
            )));
        }

        response
            .text()
            .await
            .map_err(|e| QueryError::Execution(format!("failed to read response: {}", e)))
    }
}

#[async_trait]
impl QueryBackend for ClickHouseBackend {
    async fn execute(&self, sql: &str, params: &QueryParams) -> Result<QueryResult, QueryError> {
        validate_sql(sql)?;
        validate_params(sql, params)?;

        let start = Instant::now();

        let statement = format!("{} FORMAT JSONEachRow", sql.trim().trim_end_matches(';'));
        let response_text = self.execute_query(&statement, params).await?;

        let execution_time_ms = start.elapsed().as_millis() as u64;

        let records = parse_json_each_row(&response_text)?;
        let mut result = QueryResult::from_records(records);
        result.execution_time_ms = execution_time_ms;

        tracing::debug!(
            rows = result.row_count,
            cols = result.columns.len(),
            params = params.len(),
            time_ms = execution_time_ms,
            "ClickHouse query executed"
        );

        Ok(result)
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        self.execute_query("SELECT 1", &QueryParams::new()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "clickhouse"
    }
}

/// Parse a `JSONEachRow` body into records, skipping blank lines
fn parse_json_each_row(body: &str) -> Result<Vec<Record>, QueryError> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<Record>(line).map_err(|e| {
                QueryError::Serialization(format!("failed to parse JSON row: {}", e))
            })
        })
        .collect()
}
