//! Tally Query - SQL execution against the analytical store
//!
//! Provides the [`QueryBackend`] seam the analytics engine talks through, the
//! parameter-binding types every generated statement uses, and the ClickHouse
//! HTTP implementation.
//!
//! # Usage
//!
//! ```ignore
//! use tally_query::{ClickHouseBackend, ClickHouseBackendConfig, ParamType, QueryBackend, QueryParams};
//!
//! let backend = ClickHouseBackend::new(&ClickHouseBackendConfig::new("http://localhost:8123", "balance"))?;
//!
//! let mut params = QueryParams::new();
//! let start = params.bind(ParamType::Date, "2024-01-01");
//! let sql = format!("SELECT sum(sales_price) AS sales FROM transactions WHERE date >= {}", start);
//!
//! let result = backend.execute(&sql, &params).await?;
//! println!("Rows: {}", result.row_count);
//! ```

pub mod backend;
pub mod error;
pub mod params;
pub mod result;

// Re-exports
pub use backend::QueryBackend;
pub use backend::clickhouse::{ClickHouseBackend, ClickHouseBackendConfig};
pub use error::QueryError;
pub use params::{ParamType, QueryParam, QueryParams};
pub use result::{Column, DataType, QueryResult, Record};
