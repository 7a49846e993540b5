//! Grouping dimensions
//!
//! A dimension is either a plain column (`seller_id`, `brand`) or a calendar
//! bucket over each table's date column (`month`). Some id-like columns pair
//! with a human-readable name column that lives in a single table.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::registry::TableSchema;

/// Calendar bucket for time dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Per day
    Daily,
    /// Per ISO week
    Weekly,
    /// Per month
    Monthly,
    /// Per quarter
    Quarterly,
    /// Per year
    Yearly,
}

impl Granularity {
    /// Parse granularity from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            "yearly" | "year" => Ok(Self::Yearly),
            _ => Err(AnalyticsError::InvalidGroupBy(format!(
                "unknown granularity: {}",
                s
            ))),
        }
    }

    /// Get ClickHouse date function for this granularity
    pub fn clickhouse_fn(&self) -> &'static str {
        match self {
            Self::Daily => "toDate",
            Self::Weekly => "toMonday",
            Self::Monthly => "toStartOfMonth",
            Self::Quarterly => "toStartOfQuarter",
            Self::Yearly => "toStartOfYear",
        }
    }
}

/// Column holding the display name for an id-like dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameField {
    /// Table that carries the name column
    pub table: String,
    /// Name column
    pub column: String,
}

/// A dimension requests may group by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDimension {
    /// Dimension key as accepted in `group_by`; the column name for column dimensions
    pub name: String,

    /// Calendar bucket over the table's date column (time dimensions only)
    #[serde(default)]
    pub bucket: Option<Granularity>,

    /// Separate display-name column, if any
    #[serde(default)]
    pub name_field: Option<NameField>,
}

impl GroupDimension {
    /// A plain column dimension whose id doubles as its name
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket: None,
            name_field: None,
        }
    }

    /// A column dimension with a display-name column in `table`
    pub fn with_name(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            bucket: None,
            name_field: Some(NameField {
                table: table.into(),
                column: column.into(),
            }),
        }
    }

    /// A calendar bucket dimension
    pub fn time(name: impl Into<String>, bucket: Granularity) -> Self {
        Self {
            name: name.into(),
            bucket: Some(bucket),
            name_field: None,
        }
    }

    /// Whether `table` can be grouped by this dimension
    pub fn applies_to(&self, table: &TableSchema) -> bool {
        self.bucket.is_some() || table.has_column(&self.name)
    }

    /// SQL expression producing the string group key for `table`
    ///
    /// Previous-period rows are shifted forward a year before bucketing so a
    /// bucket lines up with the same bucket of the current period. Returns
    /// `None` when the table lacks the dimension.
    pub fn key_expr(&self, table: &TableSchema, previous_period: bool) -> Option<String> {
        match self.bucket {
            Some(bucket) => {
                let date = if previous_period {
                    format!("addYears({}, 1)", table.date_column)
                } else {
                    table.date_column.clone()
                };
                Some(format!("toString({}({}))", bucket.clickhouse_fn(), date))
            }
            None if table.has_column(&self.name) => Some(format!("toString({})", self.name)),
            None => None,
        }
    }
}

/// The default balance-sheet grouping dimensions
pub fn balance_sheet_dimensions() -> Vec<GroupDimension> {
    vec![
        GroupDimension::with_name("seller_id", "transactions", "seller_name"),
        GroupDimension::with_name("customer_id", "transactions", "customer_name"),
        GroupDimension::column("store_id"),
        GroupDimension::column("brand"),
        GroupDimension::column("category"),
        GroupDimension::column("region"),
        GroupDimension::time("month", Granularity::Monthly),
        GroupDimension::time("quarter", Granularity::Quarterly),
        GroupDimension::time("year", Granularity::Yearly),
    ]
}
