//! Prior-year period calculation
//!
//! The previous period is the current period's calendar window moved back one
//! year. Only date conditions move; every other condition applies unchanged.

use chrono::{Datelike, NaiveDate};

use crate::error::Result;
use crate::filter::{Condition, ConditionValue, DATE_FIELD, DATE_FORMAT, parse_date};

/// Shift a date by whole calendar years
///
/// Feb 29 lands on Feb 28 when the target year is not a leap year.
pub fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// Conditions for the same calendar window one year earlier
///
/// When the current period has no upper date bound it runs up to `today`, so
/// the previous period is capped at `today` minus one year.
pub fn previous_period_conditions(
    conditions: &[Condition],
    today: NaiveDate,
) -> Result<Vec<Condition>> {
    let mut shifted = Vec::with_capacity(conditions.len() + 1);
    let mut has_upper_bound = false;

    for condition in conditions {
        if !condition.is_date() {
            shifted.push(condition.clone());
            continue;
        }

        has_upper_bound |= condition.operator.is_upper_bound();
        let value = match &condition.value {
            ConditionValue::None => ConditionValue::None,
            ConditionValue::Single(v) => ConditionValue::Single(shift_value(v)?),
            ConditionValue::Multiple(values) => ConditionValue::Multiple(
                values
                    .iter()
                    .map(|v| shift_value(v))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        shifted.push(Condition::new(condition.field.clone(), condition.operator, value));
    }

    if !has_upper_bound {
        shifted.push(Condition::lte(
            DATE_FIELD,
            shift_years(today, -1).format(DATE_FORMAT).to_string(),
        ));
    }

    Ok(shifted)
}

fn shift_value(value: &str) -> Result<String> {
    Ok(shift_years(parse_date(value)?, -1)
        .format(DATE_FORMAT)
        .to_string())
}
