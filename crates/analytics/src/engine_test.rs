//! Tests for the analytics engine

use std::sync::Arc;

use serde_json::json;

use crate::engine::AnalyticsEngine;
use crate::error::AnalyticsError;
use crate::filter::Condition;
use crate::request::{DistinctValuesRequest, GroupedYoyRequest, YoyRequest};
use crate::test_support::{MockBackend, record, registry, today};

fn engine(backend: &MockBackend) -> AnalyticsEngine {
    AnalyticsEngine::new(Box::new(backend.clone()), Arc::new(registry())).with_today(today())
}

#[tokio::test]
async fn test_yoy_returns_full_field_set_for_any_subset() {
    let backend = MockBackend::returning(vec![record(&[("stock_value", json!(42))])]);
    let engine = engine(&backend);

    let request = YoyRequest::default()
        .with_metrics(vec!["stock_value".into(), "sales".into()]);
    let values = engine.build_multi_table_yoy_query(&request).await.unwrap();

    let keys: Vec<&str> = values.keys().collect();
    assert_eq!(keys, registry().all_response_field_names());
    assert_eq!(values.get("stock_value"), Some(42.0));
    assert_eq!(values.get("purchases"), Some(0.0));
}

#[tokio::test]
async fn test_yoy_single_round_trip() {
    let backend = MockBackend::returning(vec![record(&[("sales", json!(1))])]);
    let engine = engine(&backend);

    let request = YoyRequest::new(vec![
        Condition::gte("date", "2024-01-01"),
        Condition::lte("date", "2024-03-31"),
    ]);
    engine.build_multi_table_yoy_query(&request).await.unwrap();

    let log = backend.log();
    let executed = log.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].sql.starts_with("WITH transactions_current AS ("));
    assert!(executed[0].params.iter().any(|p| p.value == "2023-01-01"));
}

#[tokio::test]
async fn test_yoy_zero_sales_guards_margin_pct() {
    let backend = MockBackend::returning(vec![record(&[
        ("sales", json!(0)),
        ("gross_margin", json!(0)),
        ("gross_margin_pct", json!(0)),
    ])]);
    let engine = engine(&backend);

    let request = YoyRequest::default()
        .with_metrics(vec!["sales".into(), "gross_margin".into()]);
    let values = engine.build_multi_table_yoy_query(&request).await.unwrap();

    assert_eq!(values.get("gross_margin_pct"), Some(0.0));

    let log = backend.log();
    let executed = log.lock().unwrap();
    assert!(executed[0].sql.contains(
        "if(transactions_current.sales != 0, (transactions_current.gross_margin / transactions_current.sales) * 100, 0) AS gross_margin_pct"
    ));
}

#[tokio::test]
async fn test_yoy_no_rows_is_all_zero() {
    let backend = MockBackend::returning(vec![]);
    let values = engine(&backend)
        .build_multi_table_yoy_query(&YoyRequest::default())
        .await
        .unwrap();

    assert_eq!(values.len(), registry().all_response_field_names().len());
    assert!(values.iter().all(|(_, v)| v == 0.0));
}

#[tokio::test]
async fn test_yoy_validation_error_skips_backend() {
    let backend = MockBackend::default();
    let request = YoyRequest::default().with_metrics(vec!["revenue".into()]);

    let err = engine(&backend)
        .build_multi_table_yoy_query(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalyticsError::UnknownMetric(_)));
    assert!(backend.log().lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let backend = MockBackend::failing();

    let err = engine(&backend)
        .build_multi_table_yoy_query(&YoyRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AnalyticsError::Backend(_)));
    assert!(!err.is_request_error());
}

// =============================================================================
// Grouped
// =============================================================================

#[tokio::test]
async fn test_grouped_second_page_meta() {
    let rows = (0..50)
        .map(|i| {
            record(&[
                ("id", json!(format!("s{}", i + 50))),
                ("name", json!(format!("Seller {}", i + 50))),
                ("sales", json!(100 - i)),
                ("_total_count", json!(120)),
            ])
        })
        .collect();
    let backend = MockBackend::returning(rows);

    let request = GroupedYoyRequest::new("seller_id", vec![])
        .with_metrics(vec!["sales".into()])
        .with_page(50, 50);
    let result = engine(&backend)
        .build_grouped_multi_table_yoy_query(&request)
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 50);
    assert_eq!(result.meta.total, 120);
    assert_eq!(result.meta.page, 2);
    assert_eq!(result.meta.count, 50);
    assert_eq!(result.meta.total_pages, 3);
    assert_eq!(result.meta.group_by, "seller_id");
    assert_eq!(result.rows[0].id, "s50");
    assert_eq!(result.rows[0].name, "Seller 50");

    let log = backend.log();
    let executed = log.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].sql.ends_with("LIMIT 50 OFFSET 50"));
}

#[tokio::test]
async fn test_grouped_rows_carry_full_field_set() {
    let backend = MockBackend::returning(vec![record(&[
        ("id", json!("north")),
        ("name", json!("north")),
        ("_total_count", json!(1)),
    ])]);

    let request = GroupedYoyRequest::new("region", vec![]).with_metrics(vec!["purchases".into()]);
    let result = engine(&backend)
        .build_grouped_multi_table_yoy_query(&request)
        .await
        .unwrap();

    let keys: Vec<&str> = result.rows[0].metrics.keys().collect();
    assert_eq!(keys, registry().all_response_field_names());
}

#[tokio::test]
async fn test_grouped_all_tables_skipped_makes_no_call() {
    let backend = MockBackend::default();

    let request =
        GroupedYoyRequest::new("seller_id", vec![]).with_metrics(vec!["stock_value".into()]);
    let result = engine(&backend)
        .build_grouped_multi_table_yoy_query(&request)
        .await
        .unwrap();

    assert!(result.rows.is_empty());
    assert_eq!(result.meta.total, 0);
    assert_eq!(result.meta.page, 1);
    assert!(backend.log().lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_grouped_empty_result() {
    let backend = MockBackend::returning(vec![]);
    let request = GroupedYoyRequest::new("brand", vec![]).with_page(10, 20);

    let result = engine(&backend)
        .build_grouped_multi_table_yoy_query(&request)
        .await
        .unwrap();

    assert!(result.rows.is_empty());
    assert_eq!(result.meta.total, 0);
    assert_eq!(result.meta.page, 3);
    assert_eq!(result.meta.limit, 10);
}

#[tokio::test]
async fn test_grouped_page_past_end_reports_zero_total() {
    let backend = MockBackend::returning(vec![]);
    let request = GroupedYoyRequest::new("seller_id", vec![]).with_page(50, 150);

    let result = engine(&backend)
        .build_grouped_multi_table_yoy_query(&request)
        .await
        .unwrap();

    assert!(result.rows.is_empty());
    assert_eq!(result.meta.page, 4);
    assert_eq!(result.meta.total, 0);
    assert_eq!(result.meta.total_pages, 0);
    assert_eq!(backend.log().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_grouped_invalid_dimension() {
    let backend = MockBackend::default();
    let err = engine(&backend)
        .build_grouped_multi_table_yoy_query(&GroupedYoyRequest::new("weather", vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, AnalyticsError::InvalidGroupBy(_)));
    assert!(err.is_request_error());
}

// =============================================================================
// Distinct Values
// =============================================================================

#[tokio::test]
async fn test_distinct_values_in_store_order() {
    let backend = MockBackend::returning(vec![
        record(&[("value", json!("Apple"))]),
        record(&[("value", json!("Banana"))]),
        record(&[("value", json!("Cherry"))]),
    ]);

    let values = engine(&backend)
        .build_distinct_values_query(&DistinctValuesRequest::new("transactions", "brand"))
        .await
        .unwrap();

    assert_eq!(values, vec!["Apple", "Banana", "Cherry"]);

    let log = backend.log();
    let executed = log.lock().unwrap();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].sql.contains("ORDER BY value ASC"));
}

#[tokio::test]
async fn test_distinct_values_skip_nulls() {
    let backend = MockBackend::returning(vec![
        record(&[("value", json!("north"))]),
        record(&[("value", json!(null))]),
    ]);

    let values = engine(&backend)
        .build_distinct_values_query(&DistinctValuesRequest::new("transactions", "region"))
        .await
        .unwrap();

    assert_eq!(values, vec!["north"]);
}

#[tokio::test]
async fn test_health_check() {
    assert!(engine(&MockBackend::default()).health_check().await.is_ok());
    assert!(engine(&MockBackend::failing()).health_check().await.is_err());
}
