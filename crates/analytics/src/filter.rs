//! Filter parsing and condition handling
//!
//! Conditions are engine-agnostic predicates. Dates arrive as typed bounds,
//! everything else as a raw `key -> value` map that is checked against the
//! registry's filterable columns before it becomes a condition.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Field name that resolves to each table's date column
pub const DATE_FIELD: &str = "date";

/// Wire format for dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Field name to filter on
    pub field: String,
    /// Operator for comparison
    pub operator: Operator,
    /// Value(s) to compare against
    pub value: ConditionValue,
}

impl Condition {
    /// Create a condition from parts
    pub fn new(field: impl Into<String>, operator: Operator, value: ConditionValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality condition
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Eq, ConditionValue::Single(value.into()))
    }

    /// Create a not-equal condition
    pub fn ne(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Ne, ConditionValue::Single(value.into()))
    }

    /// Create a greater-or-equal condition
    pub fn gte(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Gte, ConditionValue::Single(value.into()))
    }

    /// Create a less-or-equal condition
    pub fn lte(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Lte, ConditionValue::Single(value.into()))
    }

    /// Create a contains condition
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operator::Contains, ConditionValue::Single(value.into()))
    }

    /// Create an IN condition
    pub fn is_in(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(field, Operator::In, ConditionValue::Multiple(values))
    }

    /// Create a NOT IN condition
    pub fn not_in(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(field, Operator::NotIn, ConditionValue::Multiple(values))
    }

    /// Create an is_set condition (field is not null)
    pub fn is_set(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsSet, ConditionValue::None)
    }

    /// Create an is_not_set condition (field is null)
    pub fn is_not_set(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotSet, ConditionValue::None)
    }

    /// Whether this condition targets the date column
    pub fn is_date(&self) -> bool {
        self.field == DATE_FIELD
    }
}

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Contains substring
    Contains,
    /// Does not contain substring
    NotContains,
    /// Starts with
    StartsWith,
    /// Ends with
    EndsWith,
    /// In list
    In,
    /// Not in list
    NotIn,
    /// Field is set (not null)
    IsSet,
    /// Field is not set (null)
    IsNotSet,
}

impl Operator {
    /// Parse operator from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "eq" | "=" | "==" => Ok(Self::Eq),
            "ne" | "neq" | "!=" | "<>" => Ok(Self::Ne),
            "gt" | ">" => Ok(Self::Gt),
            "gte" | ">=" => Ok(Self::Gte),
            "lt" | "<" => Ok(Self::Lt),
            "lte" | "<=" => Ok(Self::Lte),
            "contains" | "like" => Ok(Self::Contains),
            "not_contains" | "not_like" => Ok(Self::NotContains),
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            "in" => Ok(Self::In),
            "not_in" | "nin" => Ok(Self::NotIn),
            "is_set" | "isset" => Ok(Self::IsSet),
            "is_not_set" | "isnotset" => Ok(Self::IsNotSet),
            _ => Err(AnalyticsError::InvalidOperator(s.to_string())),
        }
    }

    /// Whether this operator bounds a range from above
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Eq | Self::In)
    }
}

/// Condition value (single, multiple, or none)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// No value (for is_set/is_not_set)
    None,
    /// Single value
    Single(String),
    /// Multiple values (for IN)
    Multiple(Vec<String>),
}

/// Typed date bounds pulled out of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DateParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl DateParams {
    pub fn new(start_date: Option<&str>, end_date: Option<&str>) -> Self {
        Self {
            start_date: start_date.map(str::to_string),
            end_date: end_date.map(str::to_string),
        }
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| AnalyticsError::InvalidDate(format!("'{}' is not a YYYY-MM-DD date", s)))
}

/// Turn date bounds into `date >= start` / `date <= end` conditions
///
/// Absent bounds produce no condition.
pub fn parse_query_params_to_filters(params: &DateParams) -> Result<Vec<Condition>> {
    let start = params.start_date.as_deref().map(parse_date).transpose()?;
    let end = params.end_date.as_deref().map(parse_date).transpose()?;

    if let (Some(start), Some(end)) = (start, end)
        && start > end
    {
        return Err(AnalyticsError::InvalidDate(format!(
            "start_date {} is after end_date {}",
            start, end
        )));
    }

    let mut conditions = Vec::with_capacity(2);
    if let Some(start) = start {
        conditions.push(Condition::gte(DATE_FIELD, start.format(DATE_FORMAT).to_string()));
    }
    if let Some(end) = end {
        conditions.push(Condition::lte(DATE_FIELD, end.format(DATE_FORMAT).to_string()));
    }
    Ok(conditions)
}

/// Turn leftover request keys into conditions
///
/// `field=value` is an equality, `field=a,b` a membership test, and
/// `field[op]=value` uses an explicit operator. Fields outside `allowed` and
/// unknown operators are rejected.
pub fn parse_dynamic_filters(
    raw: &BTreeMap<String, String>,
    allowed: &[&str],
) -> Result<Vec<Condition>> {
    let mut conditions = Vec::with_capacity(raw.len());

    for (key, value) in raw {
        let (field, operator) = split_filter_key(key)?;

        if !allowed.contains(&field) {
            return Err(AnalyticsError::InvalidFilter(format!(
                "'{}' is not a filterable field",
                field
            )));
        }

        let values: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        let condition = match operator {
            None | Some(Operator::Eq) if values.len() > 1 => Condition::is_in(field, values),
            Some(Operator::Ne) if values.len() > 1 => Condition::not_in(field, values),
            Some(op @ (Operator::In | Operator::NotIn)) => {
                if values.is_empty() {
                    return Err(empty_value(field));
                }
                Condition::new(field, op, ConditionValue::Multiple(values))
            }
            Some(op @ (Operator::IsSet | Operator::IsNotSet)) => {
                Condition::new(field, op, ConditionValue::None)
            }
            None | Some(Operator::Eq) | Some(Operator::Ne) => {
                let Some(single) = values.into_iter().next() else {
                    return Err(empty_value(field));
                };
                let op = operator.unwrap_or(Operator::Eq);
                Condition::new(field, op, ConditionValue::Single(single))
            }
            // Comparison and pattern operators take the value verbatim
            Some(op) => {
                if value.trim().is_empty() {
                    return Err(empty_value(field));
                }
                Condition::new(field, op, ConditionValue::Single(value.trim().to_string()))
            }
        };
        conditions.push(condition);
    }

    Ok(conditions)
}

/// Concatenate condition lists; duplicates are kept
pub fn combine_filters<I>(lists: I) -> Vec<Condition>
where
    I: IntoIterator<Item = Vec<Condition>>,
{
    lists.into_iter().flatten().collect()
}

/// Split `field` or `field[op]`
fn split_filter_key(key: &str) -> Result<(&str, Option<Operator>)> {
    let key = key.trim();
    let (field, operator) = match key.find('[') {
        Some(open) => {
            let Some(op) = key[open + 1..].strip_suffix(']') else {
                return Err(AnalyticsError::InvalidFilter(format!(
                    "malformed filter key '{}'",
                    key
                )));
            };
            (&key[..open], Some(Operator::parse(op)?))
        }
        None => (key, None),
    };

    if field.is_empty() {
        return Err(AnalyticsError::InvalidFilter(format!(
            "filter key '{}' has no field",
            key
        )));
    }
    Ok((field, operator))
}

fn empty_value(field: &str) -> AnalyticsError {
    AnalyticsError::InvalidFilter(format!("filter '{}' has no value", field))
}
