//! Query builder for generating SQL from conditions
//!
//! Builds ClickHouse-compatible SQL with support for:
//! - Common table expressions (WITH)
//! - Joins between CTEs
//! - Conditions rendered against bound parameters
//! - GROUP BY, ORDER BY, LIMIT/OFFSET

use chrono::NaiveDate;
use tally_query::{ParamType, QueryParams};

use crate::error::{AnalyticsError, Result};
use crate::filter::{Condition, ConditionValue, DATE_FORMAT, Operator};
use crate::registry::{ColumnType, TableSchema};

/// Query builder for analytics SQL
#[derive(Debug, Default)]
pub struct QueryBuilder {
    with: Vec<(String, String)>,
    select: Vec<String>,
    from: Option<String>,
    joins: Vec<String>,
    where_clauses: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl QueryBuilder {
    /// Create a new query builder reading from a table or CTE
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::default()
        }
    }

    /// Create a query builder with no FROM clause (constant SELECT)
    pub fn constant() -> Self {
        Self::default()
    }

    /// Add a named CTE
    pub fn with_cte(mut self, name: impl Into<String>, query: impl Into<String>) -> Self {
        self.with.push((name.into(), query.into()));
        self
    }

    /// Add a SELECT column
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }

    /// Add a SELECT column with alias
    pub fn select_as(mut self, expr: impl Into<String>, alias: impl Into<String>) -> Self {
        self.select.push(format!("{} AS {}", expr.into(), alias.into()));
        self
    }

    /// Add SELECT columns
    pub fn select_all<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add a CROSS JOIN
    pub fn cross_join(mut self, source: impl AsRef<str>) -> Self {
        self.joins.push(format!("CROSS JOIN {}", source.as_ref()));
        self
    }

    /// Add a LEFT JOIN on equal columns
    pub fn left_join_on(mut self, source: &str, left: &str, right: &str) -> Self {
        self.joins
            .push(format!("LEFT JOIN {} ON {} = {}", source, left, right));
        self
    }

    /// Add a WHERE clause
    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clauses.push(clause.into());
        self
    }

    /// Render and add WHERE clauses for every condition
    pub fn where_conditions(
        mut self,
        conditions: &[Condition],
        table: &TableSchema,
        params: &mut QueryParams,
    ) -> Result<Self> {
        for condition in conditions {
            self.where_clauses
                .push(condition_to_sql(condition, table, params)?);
        }
        Ok(self)
    }

    /// Add a GROUP BY column
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    /// Add an ORDER BY column
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    /// Set LIMIT
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set OFFSET
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Build the final SQL query
    pub fn build(self) -> String {
        let mut sql = String::new();

        // WITH
        if !self.with.is_empty() {
            let ctes: Vec<String> = self
                .with
                .iter()
                .map(|(name, query)| format!("{} AS ({})", name, query))
                .collect();
            sql.push_str("WITH ");
            sql.push_str(&ctes.join(", "));
            sql.push(' ');
        }

        // SELECT
        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }

        // FROM
        if let Some(from) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(from);
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        // WHERE
        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        // LIMIT
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        // OFFSET
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}

/// Whether every condition targets a column `table` has
pub fn table_supports(conditions: &[Condition], table: &TableSchema) -> bool {
    conditions
        .iter()
        .all(|c| c.is_date() || table.has_column(&c.field))
}

/// Convert a Condition to a SQL WHERE clause against `table`
///
/// Values are bound into `params`; only the column name, which must belong
/// to the table, is spliced into the SQL text.
pub fn condition_to_sql(
    condition: &Condition,
    table: &TableSchema,
    params: &mut QueryParams,
) -> Result<String> {
    let (column, column_type) = if condition.is_date() {
        (table.date_column.as_str(), ColumnType::Date)
    } else {
        let def = table
            .column(&condition.field)
            .ok_or_else(|| AnalyticsError::UnknownColumn {
                table: table.name.clone(),
                column: condition.field.clone(),
            })?;
        (def.name.as_str(), def.column_type)
    };

    let field = condition.field.as_str();

    let clause = match (condition.operator, &condition.value) {
        (Operator::IsSet, _) => format!("{} IS NOT NULL", column),
        (Operator::IsNotSet, _) => format!("{} IS NULL", column),
        (op @ (Operator::In | Operator::NotIn), ConditionValue::Multiple(values)) => {
            if values.is_empty() {
                return Err(AnalyticsError::InvalidFilter(format!(
                    "'{}' needs at least one value",
                    condition.field
                )));
            }
            let placeholders = values
                .iter()
                .map(|v| bind(params, field, column_type, v))
                .collect::<Result<Vec<_>>>()?;
            format!(
                "{} {} ({})",
                column,
                comparison_symbol(op),
                placeholders.join(", ")
            )
        }
        (op @ (Operator::In | Operator::NotIn), ConditionValue::Single(v)) => {
            let placeholder = bind(params, field, column_type, v)?;
            format!("{} {} ({})", column, comparison_symbol(op), placeholder)
        }
        (
            op @ (Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte),
            ConditionValue::Single(v),
        ) => {
            let placeholder = bind(params, field, column_type, v)?;
            format!("{} {} {}", column, comparison_symbol(op), placeholder)
        }
        (
            op @ (Operator::Contains
            | Operator::NotContains
            | Operator::StartsWith
            | Operator::EndsWith),
            ConditionValue::Single(v),
        ) => {
            let target = match column_type {
                ColumnType::String => column.to_string(),
                _ => format!("toString({})", column),
            };
            let pattern = params.bind(ParamType::String, v.as_str());
            match op {
                Operator::Contains => format!("position({}, {}) > 0", target, pattern),
                Operator::NotContains => format!("position({}, {}) = 0", target, pattern),
                Operator::StartsWith => format!("startsWith({}, {})", target, pattern),
                _ => format!("endsWith({}, {})", target, pattern),
            }
        }
        (op, value) => {
            return Err(AnalyticsError::InvalidFilter(format!(
                "operator {:?} cannot take value {:?} for '{}'",
                op, value, condition.field
            )));
        }
    };

    Ok(clause)
}

fn comparison_symbol(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::Ne => "!=",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::NotIn => "NOT IN",
        _ => "IN",
    }
}

/// Bind a value typed after its column
fn bind(
    params: &mut QueryParams,
    field: &str,
    column_type: ColumnType,
    value: &str,
) -> Result<String> {
    check_value(field, column_type, value)?;
    Ok(params.bind(column_type.param_type(), value))
}

/// Reject values the column type cannot hold before they reach the store
fn check_value(field: &str, column_type: ColumnType, value: &str) -> Result<()> {
    let ok = match column_type {
        ColumnType::String => true,
        ColumnType::Date => NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok(),
        ColumnType::Float64 => value.parse::<f64>().is_ok_and(f64::is_finite),
        ColumnType::Int64 => value.parse::<i64>().is_ok(),
        ColumnType::UInt64 => value.parse::<u64>().is_ok(),
    };

    if ok {
        Ok(())
    } else if column_type == ColumnType::Date {
        Err(AnalyticsError::InvalidDate(format!(
            "'{}' is not a YYYY-MM-DD date for '{}'",
            value, field
        )))
    } else {
        Err(AnalyticsError::InvalidFilter(format!(
            "'{}' is not a valid {:?} value for '{}'",
            value, column_type, field
        )))
    }
}
