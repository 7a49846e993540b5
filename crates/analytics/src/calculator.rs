//! Calculated metric resolution
//!
//! Calculated metrics are resolved with a fixed-point loop: each pass adds
//! every metric whose dependencies are all known, until a pass adds nothing.
//! Forward references therefore work regardless of declaration order, and
//! metrics that can never resolve (missing dependency or cycle) are left out
//! without an error.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::registry::{BaseMetric, CalculatedMetric};

/// Requested base metrics grouped by source table
///
/// Tables keep the order in which they first appear among the metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsByTable {
    tables: Vec<(String, Vec<BaseMetric>)>,
}

impl MetricsByTable {
    pub fn from_metrics(metrics: &[BaseMetric]) -> Self {
        let mut tables: Vec<(String, Vec<BaseMetric>)> = Vec::new();
        for metric in metrics {
            match tables.iter_mut().find(|(name, _)| *name == metric.table) {
                Some((_, list)) => list.push(metric.clone()),
                None => tables.push((metric.table.clone(), vec![metric.clone()])),
            }
        }
        Self { tables }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[BaseMetric])> {
        self.tables
            .iter()
            .map(|(name, metrics)| (name.as_str(), metrics.as_slice()))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(name, _)| name.as_str())
    }

    pub fn metrics(&self) -> impl Iterator<Item = &BaseMetric> {
        self.tables.iter().flat_map(|(_, metrics)| metrics.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// CTE name holding a table's current-period aggregates
pub fn current_cte(table: &str) -> String {
    format!("{}_current", table)
}

/// CTE name holding a table's previous-period aggregates
pub fn previous_cte(table: &str) -> String {
    format!("{}_previous", table)
}

/// Map each metric alias (and its `_last_year` form) to a SQL reference
///
/// Metrics of skipped tables map to their own output names, which the query
/// selects as literal zeros.
pub fn build_alias_map(
    by_table: &MetricsByTable,
    skipped: &BTreeSet<String>,
) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (table, metrics) in by_table.iter() {
        let is_skipped = skipped.contains(table);
        for metric in metrics {
            let (current, previous) = if is_skipped {
                (metric.alias.clone(), metric.ly_column())
            } else {
                (
                    format!("{}.{}", current_cte(table), metric.alias),
                    format!("{}.{}", previous_cte(table), metric.ly_column()),
                )
            };
            map.insert(metric.alias.clone(), current);
            map.insert(metric.last_year_field(), previous);
        }
    }
    map
}

/// A calculated metric with its placeholders substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetric {
    pub name: String,
    pub expr: String,
}

impl ResolvedMetric {
    /// SELECT-list fragment
    pub fn select(&self) -> String {
        format!("{} AS {}", self.expr, self.name)
    }
}

/// Resolve every satisfiable calculated metric against `alias_map`
///
/// A pass only sees metrics added by earlier passes, so output order is
/// declaration order within each pass.
pub fn resolve_calculated(
    calculated: &[CalculatedMetric],
    alias_map: &HashMap<String, String>,
) -> Vec<ResolvedMetric> {
    let mut resolved = Vec::new();
    let mut added: HashSet<&str> = HashSet::new();

    loop {
        let mut progressed = false;
        let known = added.clone();

        for metric in calculated {
            if added.contains(metric.name.as_str()) {
                continue;
            }

            let satisfiable = metric
                .dependencies
                .iter()
                .all(|dep| alias_map.contains_key(dep) || known.contains(dep.as_str()));
            if !satisfiable {
                continue;
            }

            let mut expr = metric.formula.clone();
            for dep in &metric.dependencies {
                // An added calculated metric is referenced by its output name
                let reference = alias_map.get(dep).map(String::as_str).unwrap_or(dep);
                expr = expr.replace(&format!("{{{}}}", dep), reference);
            }

            resolved.push(ResolvedMetric {
                name: metric.name.clone(),
                expr,
            });
            added.insert(metric.name.as_str());
            progressed = true;
        }

        if !progressed {
            break;
        }
    }

    resolved
}

/// SELECT-list fragments (`<formula> AS <name>`) for calculated metrics
pub fn calculated_metric_selects(
    calculated: &[CalculatedMetric],
    by_table: &MetricsByTable,
    skipped: &BTreeSet<String>,
) -> Vec<String> {
    let alias_map = build_alias_map(by_table, skipped);
    resolve_calculated(calculated, &alias_map)
        .iter()
        .map(ResolvedMetric::select)
        .collect()
}
