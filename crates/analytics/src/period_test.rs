//! Tests for prior-year period calculation

use chrono::NaiveDate;

use crate::error::AnalyticsError;
use crate::filter::{Condition, ConditionValue};
use crate::period::{previous_period_conditions, shift_years};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_shift_years() {
    assert_eq!(shift_years(date(2024, 3, 15), -1), date(2023, 3, 15));
    assert_eq!(shift_years(date(2024, 12, 31), -1), date(2023, 12, 31));
    assert_eq!(shift_years(date(2023, 1, 1), 1), date(2024, 1, 1));
}

#[test]
fn test_shift_years_leap_day_clamps() {
    assert_eq!(shift_years(date(2024, 2, 29), -1), date(2023, 2, 28));
    assert_eq!(shift_years(date(2024, 2, 29), -4), date(2020, 2, 29));
}

#[test]
fn test_previous_period_shifts_date_bounds() {
    let current = vec![
        Condition::gte("date", "2024-01-01"),
        Condition::lte("date", "2024-02-29"),
        Condition::eq("brand", "Apple"),
    ];

    let previous = previous_period_conditions(&current, date(2025, 1, 1)).unwrap();

    assert_eq!(
        previous,
        vec![
            Condition::gte("date", "2023-01-01"),
            Condition::lte("date", "2023-02-28"),
            Condition::eq("brand", "Apple"),
        ]
    );
}

#[test]
fn test_previous_period_caps_open_end() {
    let current = vec![Condition::gte("date", "2024-01-01")];

    let previous = previous_period_conditions(&current, date(2024, 6, 15)).unwrap();

    assert_eq!(
        previous,
        vec![
            Condition::gte("date", "2023-01-01"),
            Condition::lte("date", "2023-06-15"),
        ]
    );
}

#[test]
fn test_previous_period_without_dates() {
    let previous = previous_period_conditions(&[], date(2024, 6, 15)).unwrap();
    assert_eq!(previous, vec![Condition::lte("date", "2023-06-15")]);
}

#[test]
fn test_previous_period_shifts_lists() {
    let current = vec![Condition::is_in(
        "date",
        vec!["2024-01-01".into(), "2024-07-04".into()],
    )];

    let previous = previous_period_conditions(&current, date(2025, 1, 1)).unwrap();

    // An IN list bounds the range, so no cap is added
    assert_eq!(previous.len(), 1);
    assert_eq!(
        previous[0].value,
        ConditionValue::Multiple(vec!["2023-01-01".into(), "2023-07-04".into()])
    );
}

#[test]
fn test_previous_period_rejects_bad_date() {
    let current = vec![Condition::gte("date", "yesterday")];
    let err = previous_period_conditions(&current, date(2025, 1, 1)).unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidDate(_)));
}
