//! Typed engine requests
//!
//! The HTTP layer (or any other caller) parses its input into these before
//! anything touches SQL.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::filter::Condition;

/// Maximum allowed limit for query results
pub const MAX_LIMIT: u32 = 10_000;

/// Page size when a request names none
pub const DEFAULT_LIMIT: u32 = 50;

/// Sort direction for grouped rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    /// Parse direction from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(AnalyticsError::InvalidFilter(format!(
                "unknown order direction: {}",
                s
            ))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Single-row year-over-year request
#[derive(Debug, Clone, Default)]
pub struct YoyRequest {
    /// Base metric aliases; empty selects every base metric
    pub metrics: Vec<String>,
    /// Conditions for the current period
    pub current_period_filters: Vec<Condition>,
}

impl YoyRequest {
    pub fn new(current_period_filters: Vec<Condition>) -> Self {
        Self {
            metrics: Vec::new(),
            current_period_filters,
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<String>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Year-over-year request split by a dimension
#[derive(Debug, Clone)]
pub struct GroupedYoyRequest {
    /// Base metric aliases; empty selects every base metric
    pub metrics: Vec<String>,
    /// Conditions for the current period
    pub current_period_filters: Vec<Condition>,
    /// Grouping dimension
    pub group_by: String,
    /// Page size (capped at MAX_LIMIT)
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
    /// Output field to sort by; unknown fields fall back to the default
    pub order_by: Option<String>,
    pub order_direction: OrderDirection,
}

impl GroupedYoyRequest {
    pub fn new(group_by: impl Into<String>, current_period_filters: Vec<Condition>) -> Self {
        Self {
            metrics: Vec::new(),
            current_period_filters,
            group_by: group_by.into(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            order_by: None,
            order_direction: OrderDirection::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<String>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set page size and offset
    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn with_order(mut self, order_by: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(order_by.into());
        self.order_direction = direction;
        self
    }

    /// Page size actually applied
    pub fn effective_limit(&self) -> Result<u32> {
        effective_limit(self.limit)
    }
}

/// Distinct values of one column, for filter suggestions
#[derive(Debug, Clone)]
pub struct DistinctValuesRequest {
    pub table: String,
    pub column: String,
    pub filters: Vec<Condition>,
    pub limit: u32,
    pub offset: u32,
}

impl DistinctValuesRequest {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            filters: Vec::new(),
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_filters(mut self, filters: Vec<Condition>) -> Self {
        self.filters = filters;
        self
    }

    /// Set page size and offset
    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Page size actually applied
    pub fn effective_limit(&self) -> Result<u32> {
        effective_limit(self.limit)
    }
}

fn effective_limit(limit: u32) -> Result<u32> {
    if limit == 0 {
        return Err(AnalyticsError::OutOfRange(
            "limit must be at least 1".to_string(),
        ));
    }
    Ok(limit.min(MAX_LIMIT))
}
