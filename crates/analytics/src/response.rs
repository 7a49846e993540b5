//! Response normalization
//!
//! Raw store rows carry whatever fields the query happened to select. The
//! normalized shape always carries the registry's full field set, in
//! registration order, with absent or non-numeric values reported as 0.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tally_query::Record;

use crate::registry::{LY_SUFFIX, MetricRegistry};

/// Metric name to value, in registry order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricValues {
    values: Vec<(String, f64)>,
}

impl MetricValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for MetricValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One row of a grouped response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub metrics: MetricValues,
    /// Total groups matching the request, identical on every row
    #[serde(rename = "_total_count")]
    pub total_count: u64,
}

/// Pagination metadata for grouped responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub group_by: String,
    /// Groups matching the request across all pages
    ///
    /// Read from the window count on the returned rows, so a page past the
    /// last group reports 0.
    pub total: u64,
    /// Rows on this page
    pub count: usize,
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(group_by: impl Into<String>, total: u64, count: usize, limit: u32, offset: u32) -> Self {
        let limit = limit.max(1);
        Self {
            group_by: group_by.into(),
            total,
            count,
            page: offset / limit + 1,
            limit,
            total_pages: total.div_ceil(u64::from(limit)),
        }
    }
}

/// A page of grouped rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedResult {
    pub rows: Vec<GroupedRow>,
    pub meta: PageMeta,
}

/// Reshape a raw row into the full registry field set
///
/// `<alias>_last_year` falls back to the internal `<alias>_ly` column when
/// only that is present.
pub fn build_dynamic_response(registry: &MetricRegistry, raw: &Record) -> MetricValues {
    let mut values = MetricValues::new();

    for metric in registry.base_metrics() {
        let last_year = metric.last_year_field();
        let vs_last_year = metric.vs_last_year_field();

        let previous = raw
            .get(&last_year)
            .or_else(|| raw.get(&format!("{}{}", metric.alias, LY_SUFFIX)));

        values.push(metric.alias.clone(), number(raw.get(&metric.alias)));
        values.push(last_year, number(previous));
        values.push(vs_last_year.clone(), number(raw.get(&vs_last_year)));
    }

    for metric in registry.calculated_metrics() {
        values.push(metric.name.clone(), number(raw.get(&metric.name)));
    }

    values
}

/// Normalize grouped rows
pub fn build_grouped_rows(registry: &MetricRegistry, records: &[Record]) -> Vec<GroupedRow> {
    records
        .iter()
        .map(|raw| {
            let id = text(raw.get("id")).unwrap_or_default();
            let name = text(raw.get("name"))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| id.clone());
            GroupedRow {
                id,
                name,
                metrics: build_dynamic_response(registry, raw),
                total_count: count(raw.get("_total_count")),
            }
        })
        .collect()
}

/// Coerce a store value to a finite number
///
/// ClickHouse may quote 64-bit integers as strings; anything non-numeric or
/// non-finite reads as 0.
pub fn number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
