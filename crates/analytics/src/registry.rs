//! Metric configuration registry
//!
//! The registry is the single source of truth for what the engine can compute:
//! the fact tables and their columns, base metrics (one aggregation over one
//! column), calculated metrics (SQL formulas over other metrics), and the
//! dimensions requests may group by. Query building, response normalization
//! and schema generation all derive from it; nothing downstream names a metric.
//!
//! A registry is validated once when built and is read-only afterwards.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_query::ParamType;

use crate::calculator::{MetricsByTable, build_alias_map, resolve_calculated};
use crate::dimension::{GroupDimension, balance_sheet_dimensions};
use crate::error::{AnalyticsError, RegistryError, Result};

/// Suffix of the previous-period column inside `<table>_previous` CTEs
pub const LY_SUFFIX: &str = "_ly";
/// Suffix of the previous-period output field
pub const LAST_YEAR_SUFFIX: &str = "_last_year";
/// Suffix of the percent-change output field
pub const VS_LAST_YEAR_SUFFIX: &str = "_vs_last_year";

/// Output fields the engine adds to grouped rows
const RESERVED_FIELDS: &[&str] = &["id", "name", "_total_count", "group_id", "group_name"];

// =============================================================================
// Tables
// =============================================================================

/// Column type, used to type bound parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Date,
    Float64,
    Int64,
    UInt64,
}

impl ColumnType {
    /// Parameter type for values compared against this column
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::String => ParamType::String,
            Self::Date => ParamType::Date,
            Self::Float64 => ParamType::Float64,
            Self::Int64 => ParamType::Int64,
            Self::UInt64 => ParamType::UInt64,
        }
    }
}

/// A column of a fact table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A fact table the engine may read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Column the `date` filter field and time dimensions resolve to
    #[serde(default = "default_date_column")]
    pub date_column: String,
    pub columns: Vec<ColumnDef>,
}

fn default_date_column() -> String {
    "date".to_string()
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        date_column: impl Into<String>,
        columns: Vec<ColumnDef>,
    ) -> Self {
        Self {
            name: name.into(),
            date_column: date_column.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Aggregation applied by a base metric
///
/// Every variant reports 0 over an empty set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::CountDistinct => "count_distinct",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// ClickHouse aggregate expression over `field`
    pub fn sql(&self, field: &str) -> String {
        match self {
            Self::Sum => format!("sumOrDefault({})", field),
            Self::Avg => format!("avgOrDefault({})", field),
            Self::Count => format!("count({})", field),
            Self::CountDistinct => format!("uniqExact({})", field),
            Self::Min => format!("minOrDefault({})", field),
            Self::Max => format!("maxOrDefault({})", field),
        }
    }
}

/// One aggregation of one column from one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseMetric {
    pub table: String,
    pub field: String,
    pub aggregation: Aggregation,
    pub alias: String,
}

impl BaseMetric {
    pub fn new(
        table: impl Into<String>,
        field: impl Into<String>,
        aggregation: Aggregation,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            aggregation,
            alias: alias.into(),
        }
    }

    /// Column name inside the `<table>_previous` CTE
    pub fn ly_column(&self) -> String {
        format!("{}{}", self.alias, LY_SUFFIX)
    }

    /// Previous-period output field
    pub fn last_year_field(&self) -> String {
        format!("{}{}", self.alias, LAST_YEAR_SUFFIX)
    }

    /// Percent-change output field
    pub fn vs_last_year_field(&self) -> String {
        format!("{}{}", self.alias, VS_LAST_YEAR_SUFFIX)
    }
}

/// A metric derived from other metrics through a SQL formula
///
/// The formula is trusted configuration. `{alias}` placeholders are replaced
/// with SQL references; request values never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedMetric {
    pub name: String,
    pub dependencies: Vec<String>,
    pub formula: String,
}

impl CalculatedMetric {
    pub fn new(name: impl Into<String>, dependencies: &[&str], formula: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            formula: formula.into(),
        }
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// A configuration gap that does not fail requests but loses output fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryDiagnostic {
    /// Dependency names nothing in the registry
    MissingDependency { metric: String, dependency: String },
    /// All dependencies exist but can never resolve (cycle, or depends on one)
    Unresolvable { metric: String },
    /// Formula uses a placeholder that is not a declared dependency
    UndeclaredPlaceholder { metric: String, placeholder: String },
    /// Declared dependency is never used by the formula
    UnusedDependency { metric: String, dependency: String },
}

impl fmt::Display for RegistryDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDependency { metric, dependency } => write!(
                f,
                "calculated metric '{}' depends on unknown metric '{}' and will be omitted",
                metric, dependency
            ),
            Self::Unresolvable { metric } => write!(
                f,
                "calculated metric '{}' has a circular dependency and will be omitted",
                metric
            ),
            Self::UndeclaredPlaceholder {
                metric,
                placeholder,
            } => write!(
                f,
                "calculated metric '{}' uses placeholder '{{{}}}' that is not a declared dependency",
                metric, placeholder
            ),
            Self::UnusedDependency { metric, dependency } => write!(
                f,
                "calculated metric '{}' declares dependency '{}' but never uses it",
                metric, dependency
            ),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registry file layout
#[derive(Debug, Deserialize)]
struct RegistryFile {
    tables: Vec<TableSchema>,
    base: Vec<BaseMetric>,
    #[serde(default)]
    calculated: Vec<CalculatedMetric>,
    #[serde(default)]
    dimensions: Vec<GroupDimension>,
}

/// Validated, read-only metric configuration
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    tables: Vec<TableSchema>,
    base: Vec<BaseMetric>,
    calculated: Vec<CalculatedMetric>,
    dimensions: Vec<GroupDimension>,
}

impl MetricRegistry {
    /// Build and validate a registry
    pub fn new(
        tables: Vec<TableSchema>,
        base: Vec<BaseMetric>,
        calculated: Vec<CalculatedMetric>,
        dimensions: Vec<GroupDimension>,
    ) -> std::result::Result<Self, RegistryError> {
        let registry = Self {
            tables,
            base,
            calculated,
            dimensions,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Parse a registry from TOML text
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, RegistryError> {
        s.parse()
    }

    /// Load a registry from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// The built-in balance-sheet configuration
    pub fn balance_sheet() -> std::result::Result<Self, RegistryError> {
        use Aggregation::*;
        use ColumnType as C;

        let dims = |extra: &[(&str, ColumnType)]| {
            let mut columns = vec![
                ColumnDef::new("date", C::Date),
                ColumnDef::new("store_id", C::String),
                ColumnDef::new("brand", C::String),
                ColumnDef::new("category", C::String),
                ColumnDef::new("region", C::String),
            ];
            columns.extend(extra.iter().map(|(n, t)| ColumnDef::new(*n, *t)));
            columns
        };

        let tables = vec![
            TableSchema::new(
                "transactions",
                "date",
                dims(&[
                    ("seller_id", C::String),
                    ("seller_name", C::String),
                    ("customer_id", C::String),
                    ("customer_name", C::String),
                    ("transaction_id", C::String),
                    ("sales_price", C::Float64),
                    ("gross_margin", C::Float64),
                    ("quantity", C::Float64),
                ]),
            ),
            TableSchema::new(
                "inventory",
                "date",
                dims(&[("stock_value", C::Float64), ("stock_quantity", C::Float64)]),
            ),
            TableSchema::new(
                "purchases",
                "date",
                dims(&[
                    ("supplier_id", C::String),
                    ("purchase_value", C::Float64),
                    ("purchase_quantity", C::Float64),
                ]),
            ),
        ];

        let base = vec![
            BaseMetric::new("transactions", "sales_price", Sum, "sales"),
            BaseMetric::new("transactions", "gross_margin", Sum, "gross_margin"),
            BaseMetric::new("transactions", "quantity", Sum, "units_sold"),
            BaseMetric::new("transactions", "transaction_id", CountDistinct, "transaction_count"),
            BaseMetric::new("inventory", "stock_value", Avg, "stock_value"),
            BaseMetric::new("inventory", "stock_quantity", Avg, "stock_units"),
            BaseMetric::new("purchases", "purchase_value", Sum, "purchases"),
            BaseMetric::new("purchases", "purchase_quantity", Sum, "purchased_units"),
        ];

        // avg_unit_margin depends on avg_unit_price, declared after it
        let calculated = vec![
            CalculatedMetric::new(
                "gross_margin_pct",
                &["gross_margin", "sales"],
                "if({sales} != 0, ({gross_margin} / {sales}) * 100, 0)",
            ),
            CalculatedMetric::new(
                "avg_ticket",
                &["sales", "transaction_count"],
                "if({transaction_count} != 0, {sales} / {transaction_count}, 0)",
            ),
            CalculatedMetric::new(
                "avg_unit_margin",
                &["avg_unit_price", "gross_margin_pct"],
                "{avg_unit_price} * {gross_margin_pct} / 100",
            ),
            CalculatedMetric::new(
                "avg_unit_price",
                &["sales", "units_sold"],
                "if({units_sold} != 0, {sales} / {units_sold}, 0)",
            ),
            CalculatedMetric::new(
                "stock_turnover",
                &["sales", "stock_value"],
                "if({stock_value} != 0, {sales} / {stock_value}, 0)",
            ),
            CalculatedMetric::new(
                "gmroi",
                &["gross_margin", "stock_value"],
                "if({stock_value} != 0, {gross_margin} / {stock_value}, 0)",
            ),
            CalculatedMetric::new(
                "purchases_to_sales_pct",
                &["purchases", "sales"],
                "if({sales} != 0, ({purchases} / {sales}) * 100, 0)",
            ),
        ];

        Self::new(tables, base, calculated, balance_sheet_dimensions())
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// All base metrics, in registration order
    pub fn base_metrics(&self) -> &[BaseMetric] {
        &self.base
    }

    /// All calculated metrics, in registration order
    pub fn calculated_metrics(&self) -> &[CalculatedMetric] {
        &self.calculated
    }

    pub fn dimensions(&self) -> &[GroupDimension] {
        &self.dimensions
    }

    pub fn base_metric(&self, alias: &str) -> Option<&BaseMetric> {
        self.base.iter().find(|m| m.alias == alias)
    }

    /// Every field a response carries, in registration order
    ///
    /// Per base metric: alias, `<alias>_last_year`, `<alias>_vs_last_year`;
    /// then each calculated metric name.
    pub fn all_response_field_names(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.base.len() * 3 + self.calculated.len());
        for metric in &self.base {
            fields.push(metric.alias.clone());
            fields.push(metric.last_year_field());
            fields.push(metric.vs_last_year_field());
        }
        fields.extend(self.calculated.iter().map(|c| c.name.clone()));
        fields
    }

    /// Resolve requested aliases to base metrics
    ///
    /// An empty request selects every base metric. Duplicates collapse to the
    /// first occurrence.
    pub fn select_metrics(&self, aliases: &[String]) -> Result<Vec<BaseMetric>> {
        if aliases.is_empty() {
            return Ok(self.base.clone());
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let metric = self
                .base_metric(alias)
                .ok_or_else(|| AnalyticsError::UnknownMetric(alias.clone()))?;
            if seen.insert(alias.as_str()) {
                selected.push(metric.clone());
            }
        }
        Ok(selected)
    }

    /// Requested metrics grouped by table
    pub fn metrics_by_table(&self, aliases: &[String]) -> Result<MetricsByTable> {
        Ok(MetricsByTable::from_metrics(&self.select_metrics(aliases)?))
    }

    /// Look up an allowed grouping dimension
    pub fn dimension(&self, name: &str) -> Result<&GroupDimension> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| {
                AnalyticsError::InvalidGroupBy(format!(
                    "'{}' (allowed: {})",
                    name,
                    self.allowed_group_by().join(", ")
                ))
            })
    }

    /// Names accepted as `group_by`
    pub fn allowed_group_by(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.name.as_str()).collect()
    }

    /// Columns dynamic filters may target: every non-date column of any table
    pub fn filterable_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for table in &self.tables {
            for column in &table.columns {
                if column.name == table.date_column || column.column_type == ColumnType::Date {
                    continue;
                }
                if seen.insert(column.name.as_str()) {
                    columns.push(column.name.as_str());
                }
            }
        }
        columns
    }

    /// Report calculated metrics that will silently drop out of responses
    pub fn diagnose(&self) -> Vec<RegistryDiagnostic> {
        let mut diagnostics = Vec::new();

        let known: HashSet<String> = self
            .base
            .iter()
            .flat_map(|m| [m.alias.clone(), m.last_year_field()])
            .chain(self.calculated.iter().map(|c| c.name.clone()))
            .collect();

        for metric in &self.calculated {
            for dependency in &metric.dependencies {
                if !known.contains(dependency) {
                    diagnostics.push(RegistryDiagnostic::MissingDependency {
                        metric: metric.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                if !metric.formula.contains(&format!("{{{}}}", dependency)) {
                    diagnostics.push(RegistryDiagnostic::UnusedDependency {
                        metric: metric.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            for placeholder in formula_placeholders(&metric.formula) {
                if !metric.dependencies.iter().any(|d| *d == placeholder) {
                    diagnostics.push(RegistryDiagnostic::UndeclaredPlaceholder {
                        metric: metric.name.clone(),
                        placeholder,
                    });
                }
            }
        }

        // With every base metric present, anything the calculator still
        // leaves out is unreachable.
        let alias_map = build_alias_map(&MetricsByTable::from_metrics(&self.base), &BTreeSet::new());
        let resolved: HashSet<String> = resolve_calculated(&self.calculated, &alias_map)
            .into_iter()
            .map(|m| m.name)
            .collect();

        for metric in &self.calculated {
            let missing_dep = metric.dependencies.iter().any(|d| !known.contains(d));
            if !missing_dep && !resolved.contains(&metric.name) {
                diagnostics.push(RegistryDiagnostic::Unresolvable {
                    metric: metric.name.clone(),
                });
            }
        }

        diagnostics
    }

    fn validate(&self) -> std::result::Result<(), RegistryError> {
        let mut table_names = HashSet::new();
        for table in &self.tables {
            check_identifier(&table.name)?;
            if !table_names.insert(table.name.as_str()) {
                return Err(RegistryError::DuplicateTable(table.name.clone()));
            }
            for column in &table.columns {
                check_identifier(&column.name)?;
            }
            if !table.has_column(&table.date_column) {
                return Err(RegistryError::UnknownField {
                    alias: "<date>".to_string(),
                    table: table.name.clone(),
                    field: table.date_column.clone(),
                });
            }
        }

        // Every output field a base metric produces must be unique
        let mut fields = HashSet::new();
        for metric in &self.base {
            check_identifier(&metric.alias)?;
            let table = self
                .table(&metric.table)
                .ok_or_else(|| RegistryError::UnknownTable {
                    alias: metric.alias.clone(),
                    table: metric.table.clone(),
                })?;
            if !table.has_column(&metric.field) {
                return Err(RegistryError::UnknownField {
                    alias: metric.alias.clone(),
                    table: metric.table.clone(),
                    field: metric.field.clone(),
                });
            }
            for field in [
                metric.alias.clone(),
                metric.ly_column(),
                metric.last_year_field(),
                metric.vs_last_year_field(),
            ] {
                if RESERVED_FIELDS.contains(&field.as_str()) || !fields.insert(field) {
                    return Err(RegistryError::DuplicateAlias(metric.alias.clone()));
                }
            }
        }

        let mut calculated_names = HashSet::new();
        for metric in &self.calculated {
            check_identifier(&metric.name)?;
            if fields.contains(&metric.name) || RESERVED_FIELDS.contains(&metric.name.as_str()) {
                return Err(RegistryError::NameCollision(metric.name.clone()));
            }
            if !calculated_names.insert(metric.name.as_str()) {
                return Err(RegistryError::DuplicateCalculated(metric.name.clone()));
            }
        }

        let mut dimension_names = HashSet::new();
        for dimension in &self.dimensions {
            check_identifier(&dimension.name)?;
            let invalid = |message: &str| RegistryError::InvalidDimension {
                name: dimension.name.clone(),
                message: message.to_string(),
            };
            if !dimension_names.insert(dimension.name.as_str()) {
                return Err(invalid("declared twice"));
            }
            if dimension.bucket.is_none() && !self.tables.iter().any(|t| dimension.applies_to(t)) {
                return Err(invalid("no table has this column"));
            }
            if let Some(name_field) = &dimension.name_field {
                let table = self
                    .table(&name_field.table)
                    .ok_or_else(|| invalid("name field table is unknown"))?;
                if !table.has_column(&name_field.column) || !table.has_column(&dimension.name) {
                    return Err(invalid("name field table lacks the id or name column"));
                }
            }
        }

        Ok(())
    }
}

impl FromStr for MetricRegistry {
    type Err = RegistryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let file: RegistryFile = toml::from_str(s)?;
        Self::new(file.tables, file.base, file.calculated, file.dimensions)
    }
}

/// Whether `s` can be spliced into SQL as a bare identifier
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(s: &str) -> std::result::Result<(), RegistryError> {
    if is_identifier(s) {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier(s.to_string()))
    }
}

/// `{name}` placeholders used by a formula, in order of first use
fn formula_placeholders(formula: &str) -> Vec<String> {
    let mut placeholders: Vec<String> = Vec::new();
    let mut rest = formula;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if is_identifier(name) && !placeholders.iter().any(|p| p == name) {
            placeholders.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    placeholders
}
