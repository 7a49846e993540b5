//! Query backend trait and implementations

pub mod clickhouse;

use async_trait::async_trait;

use crate::error::QueryError;
use crate::params::QueryParams;
use crate::result::QueryResult;

/// Query backend trait
///
/// The analytics engine only ever talks to the store through this trait, so
/// tests substitute an in-memory implementation.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute a SQL statement with bound parameters
    async fn execute(&self, sql: &str, params: &QueryParams) -> Result<QueryResult, QueryError>;

    /// Check if backend is available
    async fn health_check(&self) -> Result<(), QueryError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Validate SQL query - only allow SELECT and WITH (CTE) queries
///
/// A guardrail against accidental destructive statements, not a security
/// boundary: request values are bound as parameters and never reach the text.
pub fn validate_sql(sql: &str) -> Result<(), QueryError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();

    // Must start with SELECT or WITH (CTE)
    if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
        return Err(QueryError::InvalidSql(
            "only SELECT and WITH queries are allowed".to_string(),
        ));
    }

    // Block SELECT ... INTO (creates tables in some databases)
    if upper.contains(" INTO ") && !upper.contains("INSERT INTO") {
        return Err(QueryError::InvalidSql(
            "SELECT INTO is not allowed".to_string(),
        ));
    }

    // Disallow multiple statements; a trailing semicolon is fine
    if trimmed.contains(';') && !trimmed.ends_with(';') {
        return Err(QueryError::InvalidSql(
            "multiple statements not allowed".to_string(),
        ));
    }

    Ok(())
}

/// Check that every parameter placeholder in `sql` has a bound value
pub fn validate_params(sql: &str, params: &QueryParams) -> Result<(), QueryError> {
    let mut rest = sql;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let inner = &after[..end];
        if let Some((name, _ty)) = inner.split_once(':')
            && !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && params.get(name).is_none()
        {
            return Err(QueryError::InvalidParam(format!(
                "placeholder '{}' has no bound value",
                name
            )));
        }
        rest = &after[end + 1..];
    }
    Ok(())
}
