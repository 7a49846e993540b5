//! Tally Analytics Engine
//!
//! Year-over-year balance-sheet analytics compiled to a single ClickHouse query.
//!
//! # Overview
//!
//! This crate provides the analytics layer for Tally, built on top of `tally-query`.
//! It includes:
//!
//! - **Registry**: Tables, base metrics, calculated metrics, grouping dimensions
//! - **Filters**: Date bounds and dynamic column filters
//! - **Calculator**: Fixed-point resolution of calculated metric formulas
//! - **Query Builder**: Per-table current/previous CTEs joined into one statement
//! - **Responses**: Normalization to the registry's full field set, plus its schema
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tally_analytics::{
//!     AnalyticsEngine, DateParams, GroupedYoyRequest, MetricRegistry, parse_query_params_to_filters,
//! };
//!
//! let registry = Arc::new(MetricRegistry::balance_sheet()?);
//! let engine = AnalyticsEngine::new(backend, registry);
//!
//! let filters = parse_query_params_to_filters(&DateParams::new(Some("2024-01-01"), None))?;
//! let page = engine
//!     .build_grouped_multi_table_yoy_query(&GroupedYoyRequest::new("seller_id", filters))
//!     .await?;
//! ```

pub mod builder;
pub mod calculator;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod filter;
pub mod period;
pub mod registry;
pub mod request;
pub mod response;
pub mod schema;
pub mod yoy;

#[cfg(test)]
mod engine_test;
#[cfg(test)]
mod period_test;
#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use builder::QueryBuilder;
pub use calculator::{MetricsByTable, build_alias_map, calculated_metric_selects};
pub use dimension::{GroupDimension, Granularity, NameField};
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, RegistryError, Result};
pub use filter::{
    Condition, ConditionValue, DATE_FIELD, DateParams, Operator, combine_filters,
    parse_dynamic_filters, parse_query_params_to_filters,
};
pub use period::{previous_period_conditions, shift_years};
pub use registry::{
    Aggregation, BaseMetric, CalculatedMetric, ColumnDef, ColumnType, MetricRegistry,
    RegistryDiagnostic, TableSchema,
};
pub use request::{
    DEFAULT_LIMIT, DistinctValuesRequest, GroupedYoyRequest, MAX_LIMIT, OrderDirection,
    YoyRequest,
};
pub use response::{GroupedResult, GroupedRow, MetricValues, PageMeta, build_dynamic_response};
pub use schema::{grouped_row_schema, response_schema};
pub use yoy::BuiltQuery;
