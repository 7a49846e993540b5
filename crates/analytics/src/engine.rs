//! Analytics engine
//!
//! Ties the registry, the SQL generators and a query backend together. Each
//! operation validates its request, builds one statement, runs it once and
//! normalizes the rows.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tally_query::{QueryBackend, QueryResult};

use crate::error::Result;
use crate::registry::MetricRegistry;
use crate::request::{DistinctValuesRequest, GroupedYoyRequest, YoyRequest};
use crate::response::{
    GroupedResult, MetricValues, PageMeta, build_dynamic_response, build_grouped_rows,
};
use crate::yoy::{BuiltQuery, distinct_values_query, grouped_yoy_query, yoy_query};

/// Year-over-year analytics over a query backend
pub struct AnalyticsEngine {
    backend: Box<dyn QueryBackend>,
    registry: Arc<MetricRegistry>,
    today: Option<NaiveDate>,
}

impl AnalyticsEngine {
    /// Create a new engine with a backend and metric registry
    pub fn new(backend: Box<dyn QueryBackend>, registry: Arc<MetricRegistry>) -> Self {
        Self {
            backend,
            registry,
            today: None,
        }
    }

    /// Pin the date open-ended periods run up to (defaults to the current UTC date)
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Get a reference to the underlying query backend
    pub fn backend(&self) -> &dyn QueryBackend {
        self.backend.as_ref()
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Check that the backend is reachable
    pub async fn health_check(&self) -> Result<()> {
        Ok(self.backend.health_check().await?)
    }

    /// Current and previous-year values for the requested metrics, as one row
    ///
    /// The result always carries the registry's full field set.
    pub async fn build_multi_table_yoy_query(&self, request: &YoyRequest) -> Result<MetricValues> {
        let query = yoy_query(&self.registry, request, self.today())?;
        tracing::debug!(
            skipped = ?query.skipped_tables,
            calculated = query.calculated.len(),
            params = query.params.len(),
            "built yoy query"
        );

        let result = self.execute(&query).await?;
        let row = result.first_record().unwrap_or_default();
        Ok(build_dynamic_response(&self.registry, &row))
    }

    /// Per-group current and previous-year values, one page at a time
    pub async fn build_grouped_multi_table_yoy_query(
        &self,
        request: &GroupedYoyRequest,
    ) -> Result<GroupedResult> {
        let limit = request.effective_limit()?;
        let Some(query) = grouped_yoy_query(&self.registry, request, self.today())? else {
            tracing::debug!(
                group_by = %request.group_by,
                "no requested table has the grouping dimension"
            );
            return Ok(GroupedResult {
                rows: Vec::new(),
                meta: PageMeta::new(&request.group_by, 0, 0, limit, request.offset),
            });
        };
        tracing::debug!(
            group_by = %request.group_by,
            skipped = ?query.skipped_tables,
            calculated = query.calculated.len(),
            params = query.params.len(),
            "built grouped yoy query"
        );

        let result = self.execute(&query).await?;
        let rows = build_grouped_rows(&self.registry, &result.records());
        // Window count; unknown once the offset passes the last group
        let total = rows.first().map(|r| r.total_count).unwrap_or(0);
        let meta = PageMeta::new(&request.group_by, total, rows.len(), limit, request.offset);

        Ok(GroupedResult { rows, meta })
    }

    /// Distinct values of a column, ascending
    pub async fn build_distinct_values_query(
        &self,
        request: &DistinctValuesRequest,
    ) -> Result<Vec<String>> {
        let query = distinct_values_query(&self.registry, request)?;
        tracing::debug!(
            table = %request.table,
            column = %request.column,
            "built distinct values query"
        );

        let result = self.execute(&query).await?;
        Ok(result
            .records()
            .into_iter()
            .filter_map(|mut record| match record.remove("value") {
                Some(Value::String(s)) => Some(s),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .collect())
    }

    async fn execute(&self, query: &BuiltQuery) -> Result<QueryResult> {
        let result = self.backend.execute(&query.sql, &query.params).await?;
        tracing::debug!(
            backend = self.backend.name(),
            rows = result.row_count,
            elapsed_ms = result.execution_time_ms,
            "query executed"
        );
        Ok(result)
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}
