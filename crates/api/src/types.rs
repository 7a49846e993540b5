//! API request and response types
//!
//! Balance-sheet endpoints take a flat query string. Parsing runs in two
//! phases: reserved keys are lifted into typed fields, and everything left is
//! treated as a dynamic column filter, validated against the registry.

use std::collections::BTreeMap;

use serde::Serialize;
use tally_analytics::{
    Condition, DEFAULT_LIMIT, DateParams, DistinctValuesRequest, GroupedYoyRequest, MAX_LIMIT,
    MetricRegistry, OrderDirection, YoyRequest, combine_filters, parse_dynamic_filters,
    parse_query_params_to_filters,
};

use crate::error::{ApiError, Result};

/// Query keys with a fixed meaning on balance-sheet endpoints
pub const RESERVED_KEYS: &[&str] = &[
    "start_date",
    "end_date",
    "group_by",
    "page",
    "limit",
    "offset",
    "order_by",
    "order_direction",
    "metrics",
];

/// Default page size for filter value suggestions
const DEFAULT_VALUES_LIMIT: u32 = 100;

/// Parsed balance-sheet query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSheetParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub group_by: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<String>,
    pub order_direction: Option<String>,
    /// Requested base metrics; empty means all
    pub metrics: Vec<String>,
    /// Remaining keys, as `field` or `field[op]`
    pub filters: BTreeMap<String, String>,
}

impl BalanceSheetParams {
    /// Split a raw query string map into reserved and filter keys
    pub fn from_query(mut raw: BTreeMap<String, String>) -> Result<Self> {
        let mut take = |key: &str| raw.remove(key).filter(|v| !v.trim().is_empty());

        let start_date = take("start_date");
        let end_date = take("end_date");
        let group_by = take("group_by");
        let page = take("page").map(|v| parse_u32("page", &v)).transpose()?;
        let limit = take("limit").map(|v| parse_u32("limit", &v)).transpose()?;
        let offset = take("offset").map(|v| parse_u32("offset", &v)).transpose()?;
        let order_by = take("order_by");
        let order_direction = take("order_direction");
        let metrics = take("metrics").map(|v| split_list(&v)).unwrap_or_default();

        Ok(Self {
            start_date,
            end_date,
            group_by,
            page,
            limit,
            offset,
            order_by,
            order_direction,
            metrics,
            filters: raw,
        })
    }

    /// Date bounds plus dynamic filters, AND-combined
    pub fn current_period_filters(&self, registry: &MetricRegistry) -> Result<Vec<Condition>> {
        let dates = parse_query_params_to_filters(&DateParams::new(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        ))?;
        let dynamic = parse_dynamic_filters(&self.filters, &registry.filterable_columns())?;
        Ok(combine_filters([dates, dynamic]))
    }

    /// Build an ungrouped request
    pub fn yoy_request(&self, registry: &MetricRegistry) -> Result<YoyRequest> {
        Ok(YoyRequest::new(self.current_period_filters(registry)?).with_metrics(self.metrics.clone()))
    }

    /// Build a grouped request
    ///
    /// `offset` wins over `page` when both are given.
    pub fn grouped_request(&self, registry: &MetricRegistry) -> Result<GroupedYoyRequest> {
        let group_by = self
            .group_by
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("group_by is required"))?;
        // Reject unknown dimensions before parsing filters
        registry.dimension(group_by)?;

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        let offset = self.resolve_offset(limit)?;

        let mut request = GroupedYoyRequest::new(group_by, self.current_period_filters(registry)?)
            .with_metrics(self.metrics.clone())
            .with_page(limit, offset);

        let direction = self
            .order_direction
            .as_deref()
            .map(OrderDirection::parse)
            .transpose()?
            .unwrap_or_default();
        if let Some(ref field) = self.order_by {
            request = request.with_order(field.clone(), direction);
        } else {
            request.order_direction = direction;
        }

        Ok(request)
    }

    fn resolve_offset(&self, limit: u32) -> Result<u32> {
        if let Some(offset) = self.offset {
            return Ok(offset);
        }
        match self.page {
            None => Ok(0),
            Some(0) => Err(ApiError::bad_request("page must be at least 1")),
            Some(page) => Ok((page - 1).saturating_mul(limit.min(MAX_LIMIT))),
        }
    }
}

/// Parsed query string for the filter values endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesParams {
    pub table: String,
    pub limit: u32,
    pub offset: u32,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub filters: BTreeMap<String, String>,
}

impl ValuesParams {
    /// Split a raw query string map; `table` is required
    pub fn from_query(mut raw: BTreeMap<String, String>) -> Result<Self> {
        let mut take = |key: &str| raw.remove(key).filter(|v| !v.trim().is_empty());

        let table = take("table").ok_or_else(|| ApiError::bad_request("table is required"))?;
        let limit = take("limit")
            .map(|v| parse_u32("limit", &v))
            .transpose()?
            .unwrap_or(DEFAULT_VALUES_LIMIT);
        let offset = take("offset")
            .map(|v| parse_u32("offset", &v))
            .transpose()?
            .unwrap_or(0);
        let start_date = take("start_date");
        let end_date = take("end_date");

        Ok(Self {
            table,
            limit,
            offset,
            start_date,
            end_date,
            filters: raw,
        })
    }

    /// Build a distinct values request for `column`
    pub fn request(&self, column: &str, registry: &MetricRegistry) -> Result<DistinctValuesRequest> {
        let dates = parse_query_params_to_filters(&DateParams::new(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        ))?;
        let dynamic = parse_dynamic_filters(&self.filters, &registry.filterable_columns())?;

        Ok(DistinctValuesRequest::new(&self.table, column)
            .with_filters(combine_filters([dates, dynamic]))
            .with_page(self.limit, self.offset))
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Create a new API response
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Response wrapper carrying pagination metadata
#[derive(Debug, Serialize)]
pub struct PagedResponse<T, M> {
    /// Response data
    pub data: T,
    /// Pagination metadata
    pub meta: M,
}

impl<T, M> PagedResponse<T, M> {
    pub fn new(data: T, meta: M) -> Self {
        Self { data, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_analytics::AnalyticsError;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn registry() -> MetricRegistry {
        MetricRegistry::balance_sheet().unwrap()
    }

    #[test]
    fn test_reserved_keys_are_lifted() {
        let params = BalanceSheetParams::from_query(raw(&[
            ("start_date", "2024-01-01"),
            ("group_by", "brand"),
            ("limit", "25"),
            ("metrics", "sales, stock_value"),
            ("region", "north"),
        ]))
        .unwrap();

        assert_eq!(params.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(params.group_by.as_deref(), Some("brand"));
        assert_eq!(params.limit, Some(25));
        assert_eq!(params.metrics, vec!["sales", "stock_value"]);
        assert_eq!(params.filters, raw(&[("region", "north")]));
    }

    #[test]
    fn test_non_numeric_paging_rejected() {
        let err = BalanceSheetParams::from_query(raw(&[("limit", "ten")])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_page_converts_to_offset() {
        let params =
            BalanceSheetParams::from_query(raw(&[("group_by", "seller_id"), ("page", "3")]))
                .unwrap();
        let request = params.grouped_request(&registry()).unwrap();
        assert_eq!(request.limit, DEFAULT_LIMIT);
        assert_eq!(request.offset, 2 * DEFAULT_LIMIT);
    }

    #[test]
    fn test_explicit_offset_wins() {
        let params = BalanceSheetParams::from_query(raw(&[
            ("group_by", "seller_id"),
            ("page", "3"),
            ("offset", "7"),
        ]))
        .unwrap();
        assert_eq!(params.grouped_request(&registry()).unwrap().offset, 7);
    }

    #[test]
    fn test_page_zero_rejected() {
        let params =
            BalanceSheetParams::from_query(raw(&[("group_by", "brand"), ("page", "0")])).unwrap();
        assert!(params.grouped_request(&registry()).is_err());
    }

    #[test]
    fn test_group_by_required_and_validated() {
        let params = BalanceSheetParams::from_query(raw(&[])).unwrap();
        assert!(matches!(
            params.grouped_request(&registry()),
            Err(ApiError::BadRequest(_))
        ));

        let params = BalanceSheetParams::from_query(raw(&[("group_by", "weather")])).unwrap();
        assert!(matches!(
            params.grouped_request(&registry()),
            Err(ApiError::Analytics(AnalyticsError::InvalidGroupBy(_)))
        ));
    }

    #[test]
    fn test_order_parsed() {
        let params = BalanceSheetParams::from_query(raw(&[
            ("group_by", "brand"),
            ("order_by", "name"),
            ("order_direction", "asc"),
        ]))
        .unwrap();
        let request = params.grouped_request(&registry()).unwrap();
        assert_eq!(request.order_by.as_deref(), Some("name"));
        assert_eq!(request.order_direction, OrderDirection::Asc);

        let params = BalanceSheetParams::from_query(raw(&[
            ("group_by", "brand"),
            ("order_direction", "sideways"),
        ]))
        .unwrap();
        assert!(params.grouped_request(&registry()).is_err());
    }

    #[test]
    fn test_unknown_filter_column_rejected() {
        let params = BalanceSheetParams::from_query(raw(&[("password", "x")])).unwrap();
        let err = params.yoy_request(&registry()).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Analytics(AnalyticsError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_yoy_request_combines_dates_and_filters() {
        let params = BalanceSheetParams::from_query(raw(&[
            ("start_date", "2024-01-01"),
            ("end_date", "2024-03-31"),
            ("brand", "Apple"),
        ]))
        .unwrap();

        let request = params.yoy_request(&registry()).unwrap();
        assert_eq!(
            request.current_period_filters,
            vec![
                Condition::gte("date", "2024-01-01"),
                Condition::lte("date", "2024-03-31"),
                Condition::eq("brand", "Apple"),
            ]
        );
    }

    #[test]
    fn test_values_params() {
        let params =
            ValuesParams::from_query(raw(&[("table", "transactions"), ("region", "north")]))
                .unwrap();
        assert_eq!(params.limit, DEFAULT_VALUES_LIMIT);

        let request = params.request("brand", &registry()).unwrap();
        assert_eq!(request.table, "transactions");
        assert_eq!(request.column, "brand");
        assert_eq!(request.filters, vec![Condition::eq("region", "north")]);

        assert!(ValuesParams::from_query(raw(&[])).is_err());
    }
}
