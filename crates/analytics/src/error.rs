//! Analytics error types

use thiserror::Error;

/// Analytics errors
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Invalid filter syntax or value
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid operator
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    /// Malformed or out-of-order date
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Grouping dimension outside the allowed list
    #[error("invalid group by: {0}")]
    InvalidGroupBy(String),

    /// Metric alias not present in the registry
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// Table not present in the registry
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Column not present on a registered table
    #[error("unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Value out of range
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Metric configuration is malformed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Backend error (from tally-query)
    #[error("backend error: {0}")]
    Backend(#[from] tally_query::QueryError),
}

impl AnalyticsError {
    /// Whether this error was caused by the request rather than the store or config
    pub fn is_request_error(&self) -> bool {
        !matches!(self, Self::Registry(_) | Self::Backend(_))
    }
}

/// Metric configuration errors, detected when a registry is built
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two base metrics share an alias
    #[error("duplicate metric alias '{0}'")]
    DuplicateAlias(String),

    /// Two tables share a name
    #[error("duplicate table '{0}'")]
    DuplicateTable(String),

    /// Two calculated metrics share a name
    #[error("duplicate calculated metric '{0}'")]
    DuplicateCalculated(String),

    /// Calculated metric name collides with a base metric output field
    #[error("calculated metric '{0}' collides with a base metric field")]
    NameCollision(String),

    /// Base metric targets a table the registry does not know
    #[error("metric '{alias}' references unknown table '{table}'")]
    UnknownTable { alias: String, table: String },

    /// Base metric aggregates a column its table does not have
    #[error("metric '{alias}' references unknown column '{table}.{field}'")]
    UnknownField {
        alias: String,
        table: String,
        field: String,
    },

    /// Dimension declared twice or pointing at an unknown table/column
    #[error("invalid dimension '{name}': {message}")]
    InvalidDimension { name: String, message: String },

    /// Identifier that cannot be spliced into SQL
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// Failed to read a registry file
    #[error("failed to read registry file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a registry file
    #[error("failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;
