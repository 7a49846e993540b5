//! Year-over-year SQL generation
//!
//! Every requested table contributes two CTEs: `<table>_current` aggregates
//! the requested period and `<table>_previous` the same calendar window a
//! year earlier. The CTEs are joined into one statement so a request costs a
//! single round trip however many metrics and tables it touches.
//!
//! A table is *skipped* when it cannot answer the request (it lacks the
//! grouping dimension or a filtered column). Its metrics are selected as
//! literal zeros and the calculator is told to reference them by name.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tally_query::QueryParams;

use crate::builder::{QueryBuilder, table_supports};
use crate::calculator::{
    MetricsByTable, ResolvedMetric, build_alias_map, current_cte, previous_cte,
    resolve_calculated,
};
use crate::dimension::GroupDimension;
use crate::error::{AnalyticsError, Result};
use crate::filter::Condition;
use crate::period::previous_period_conditions;
use crate::registry::{BaseMetric, MetricRegistry, TableSchema};
use crate::request::{DistinctValuesRequest, GroupedYoyRequest, YoyRequest};

/// Group key column inside grouped CTEs
const GROUP_ID: &str = "group_id";
/// CTE holding every group key seen in either period
const GROUP_KEYS: &str = "group_keys";
/// CTE holding display names for paired dimensions
const GROUP_NAMES: &str = "group_names";

/// A statement ready for the backend
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: QueryParams,
    /// Tables whose metrics were zeroed
    pub skipped_tables: BTreeSet<String>,
    /// Calculated metrics present in the output
    pub calculated: Vec<String>,
}

/// Single-row query over the requested metrics
pub fn yoy_query(
    registry: &MetricRegistry,
    request: &YoyRequest,
    today: NaiveDate,
) -> Result<BuiltQuery> {
    let by_table = registry.metrics_by_table(&request.metrics)?;
    let current = &request.current_period_filters;
    let previous = previous_period_conditions(current, today)?;

    let mut params = QueryParams::new();
    let ctes = table_ctes(registry, &by_table, current, &previous, None, &mut params)?;

    let resolved = resolve_calculated(
        registry.calculated_metrics(),
        &build_alias_map(&by_table, &ctes.skipped),
    );

    let mut joined = ctes.joined.iter();
    let mut builder = match joined.next() {
        Some(table) => QueryBuilder::new(current_cte(table)).cross_join(previous_cte(table)),
        None => QueryBuilder::constant(),
    };
    for table in joined {
        builder = builder
            .cross_join(current_cte(table))
            .cross_join(previous_cte(table));
    }
    for (name, sql) in ctes.ctes {
        builder = builder.with_cte(name, sql);
    }

    let sql = builder
        .select_all(base_metric_selects(&by_table, &ctes.skipped, false))
        .select_all(resolved.iter().map(ResolvedMetric::select))
        .build();

    Ok(BuiltQuery {
        sql,
        params,
        skipped_tables: ctes.skipped,
        calculated: resolved.into_iter().map(|m| m.name).collect(),
    })
}

/// Paged per-group query over the requested metrics
///
/// Returns `None` when no requested table can be grouped by the dimension:
/// there are no group keys, so the result is empty.
pub fn grouped_yoy_query(
    registry: &MetricRegistry,
    request: &GroupedYoyRequest,
    today: NaiveDate,
) -> Result<Option<BuiltQuery>> {
    let dimension = registry.dimension(&request.group_by)?;
    let by_table = registry.metrics_by_table(&request.metrics)?;
    let limit = request.effective_limit()?;
    let current = &request.current_period_filters;
    let previous = previous_period_conditions(current, today)?;

    let mut params = QueryParams::new();
    let ctes = table_ctes(
        registry,
        &by_table,
        current,
        &previous,
        Some(dimension),
        &mut params,
    )?;
    if ctes.joined.is_empty() {
        return Ok(None);
    }

    let resolved = resolve_calculated(
        registry.calculated_metrics(),
        &build_alias_map(&by_table, &ctes.skipped),
    );

    // group_keys: union of keys from every joined CTE
    let key_sources: Vec<String> = ctes
        .joined
        .iter()
        .flat_map(|t| [current_cte(t), previous_cte(t)])
        .map(|cte| format!("SELECT {} FROM {}", GROUP_ID, cte))
        .collect();
    let group_keys = format!(
        "SELECT DISTINCT {} FROM ({})",
        GROUP_ID,
        key_sources.join(" UNION ALL ")
    );

    let key_ref = format!("{}.{}", GROUP_KEYS, GROUP_ID);
    let names = group_names_cte(registry, dimension, current, &mut params)?;
    let has_names = names.is_some();
    let name_expr = if has_names {
        format!(
            "coalesce(nullIf({}.group_name, ''), {})",
            GROUP_NAMES, key_ref
        )
    } else {
        key_ref.clone()
    };

    let mut builder = QueryBuilder::new(GROUP_KEYS);
    for (name, sql) in ctes.ctes {
        builder = builder.with_cte(name, sql);
    }
    builder = builder.with_cte(GROUP_KEYS, group_keys);
    if let Some(names) = names {
        builder = builder.with_cte(GROUP_NAMES, names);
    }

    for table in &ctes.joined {
        for cte in [current_cte(table), previous_cte(table)] {
            builder = builder.left_join_on(&cte, &format!("{}.{}", cte, GROUP_ID), &key_ref);
        }
    }
    if has_names {
        builder = builder.left_join_on(
            GROUP_NAMES,
            &format!("{}.{}", GROUP_NAMES, GROUP_ID),
            &key_ref,
        );
    }

    let order_field = order_field(&by_table, &resolved, request.order_by.as_deref());

    let sql = builder
        .select_as(&key_ref, "id")
        .select_as(name_expr, "name")
        .select_all(base_metric_selects(&by_table, &ctes.skipped, true))
        .select_all(resolved.iter().map(ResolvedMetric::select))
        .select_as("count() OVER ()", "_total_count")
        .order_by(format!("{} {}", order_field, request.order_direction.as_sql()))
        .order_by("id ASC")
        .limit(limit)
        .offset(request.offset)
        .build();

    Ok(Some(BuiltQuery {
        sql,
        params,
        skipped_tables: ctes.skipped,
        calculated: resolved.into_iter().map(|m| m.name).collect(),
    }))
}

/// Distinct non-null values of one column, ascending
pub fn distinct_values_query(
    registry: &MetricRegistry,
    request: &DistinctValuesRequest,
) -> Result<BuiltQuery> {
    let table = registry
        .table(&request.table)
        .ok_or_else(|| AnalyticsError::UnknownTable(request.table.clone()))?;
    let column = table
        .column(&request.column)
        .ok_or_else(|| AnalyticsError::UnknownColumn {
            table: table.name.clone(),
            column: request.column.clone(),
        })?;
    let limit = request.effective_limit()?;

    let mut params = QueryParams::new();
    let sql = QueryBuilder::new(&table.name)
        .select(format!("DISTINCT toString({}) AS value", column.name))
        .where_clause(format!("{} IS NOT NULL", column.name))
        .where_conditions(&request.filters, table, &mut params)?
        .order_by("value ASC")
        .limit(limit)
        .offset(request.offset)
        .build();

    Ok(BuiltQuery {
        sql,
        params,
        skipped_tables: BTreeSet::new(),
        calculated: Vec::new(),
    })
}

/// Per-table CTEs and which tables were joined or skipped
struct TableCtes {
    ctes: Vec<(String, String)>,
    joined: Vec<String>,
    skipped: BTreeSet<String>,
}

fn table_ctes(
    registry: &MetricRegistry,
    by_table: &MetricsByTable,
    current: &[Condition],
    previous: &[Condition],
    dimension: Option<&GroupDimension>,
    params: &mut QueryParams,
) -> Result<TableCtes> {
    let mut out = TableCtes {
        ctes: Vec::new(),
        joined: Vec::new(),
        skipped: BTreeSet::new(),
    };

    for (name, metrics) in by_table.iter() {
        let table = registry
            .table(name)
            .ok_or_else(|| AnalyticsError::UnknownTable(name.to_string()))?;

        let groupable = dimension.is_none_or(|d| d.applies_to(table));
        if !groupable || !table_supports(current, table) {
            out.skipped.insert(name.to_string());
            continue;
        }

        let current_sql = period_cte(table, metrics, current, dimension, false, params)?;
        let previous_sql = period_cte(table, metrics, previous, dimension, true, params)?;
        out.ctes.push((current_cte(name), current_sql));
        out.ctes.push((previous_cte(name), previous_sql));
        out.joined.push(name.to_string());
    }

    Ok(out)
}

fn period_cte(
    table: &TableSchema,
    metrics: &[BaseMetric],
    conditions: &[Condition],
    dimension: Option<&GroupDimension>,
    previous_period: bool,
    params: &mut QueryParams,
) -> Result<String> {
    let mut builder = QueryBuilder::new(&table.name);

    if let Some(dimension) = dimension {
        let key = dimension
            .key_expr(table, previous_period)
            .ok_or_else(|| AnalyticsError::UnknownColumn {
                table: table.name.clone(),
                column: dimension.name.clone(),
            })?;
        builder = builder.select_as(key, GROUP_ID).group_by(GROUP_ID);
    }

    for metric in metrics {
        let alias = if previous_period {
            metric.ly_column()
        } else {
            metric.alias.clone()
        };
        builder = builder.select_as(metric.aggregation.sql(&metric.field), alias);
    }

    Ok(builder.where_conditions(conditions, table, params)?.build())
}

/// Display names for a paired dimension
///
/// Names do not depend on the period, so only non-date filters apply. Returns
/// `None` when the dimension has no name column or the name table cannot take
/// the filters.
fn group_names_cte(
    registry: &MetricRegistry,
    dimension: &GroupDimension,
    current: &[Condition],
    params: &mut QueryParams,
) -> Result<Option<String>> {
    let Some(name_field) = &dimension.name_field else {
        return Ok(None);
    };
    let Some(table) = registry.table(&name_field.table) else {
        return Ok(None);
    };
    let filters: Vec<Condition> = current.iter().filter(|c| !c.is_date()).cloned().collect();
    let Some(key) = dimension.key_expr(table, false) else {
        return Ok(None);
    };
    if !table_supports(&filters, table) {
        return Ok(None);
    }

    let sql = QueryBuilder::new(&table.name)
        .select_as(key, GROUP_ID)
        .select_as(format!("any({})", name_field.column), "group_name")
        .where_conditions(&filters, table, params)?
        .group_by(GROUP_ID)
        .build();
    Ok(Some(sql))
}

/// Value, previous value and percent change for every requested metric
fn base_metric_selects(
    by_table: &MetricsByTable,
    skipped: &BTreeSet<String>,
    grouped: bool,
) -> Vec<String> {
    let mut selects = Vec::new();

    for (table, metrics) in by_table.iter() {
        for metric in metrics {
            if skipped.contains(table) {
                selects.push(format!("0 AS {}", metric.alias));
                selects.push(format!("0 AS {}", metric.ly_column()));
                selects.push(format!("0 AS {}", metric.last_year_field()));
                selects.push(format!("0 AS {}", metric.vs_last_year_field()));
                continue;
            }

            let mut current = format!("{}.{}", current_cte(table), metric.alias);
            let mut previous = format!("{}.{}", previous_cte(table), metric.ly_column());
            if grouped {
                current = format!("coalesce({}, 0)", current);
                previous = format!("coalesce({}, 0)", previous);
            }

            let alias = &metric.alias;
            let last_year = metric.last_year_field();
            selects.push(format!("{} AS {}", current, alias));
            selects.push(format!("{} AS {}", previous, last_year));
            selects.push(format!(
                "if({ly} != 0, (({cur} - {ly}) / {ly}) * 100, 0) AS {out}",
                ly = last_year,
                cur = alias,
                out = metric.vs_last_year_field()
            ));
        }
    }

    selects
}

/// Validated ORDER BY field
///
/// Accepts `id`, `name`, any output field of a requested metric or a resolved
/// calculated metric; anything else sorts by the first requested metric.
fn order_field(
    by_table: &MetricsByTable,
    resolved: &[ResolvedMetric],
    requested: Option<&str>,
) -> String {
    let mut fallback = None;
    if let Some(requested) = requested {
        let known = requested == "id"
            || requested == "name"
            || resolved.iter().any(|m| m.name == requested)
            || by_table.metrics().any(|m| {
                m.alias == requested
                    || m.last_year_field() == requested
                    || m.vs_last_year_field() == requested
            });
        if known {
            return requested.to_string();
        }
        fallback = Some(requested);
    }

    let default = by_table
        .metrics()
        .next()
        .map(|m| m.alias.clone())
        .unwrap_or_else(|| "id".to_string());
    if let Some(unknown) = fallback {
        tracing::debug!(order_by = unknown, fallback = %default, "unknown order_by field");
    }
    default
}
