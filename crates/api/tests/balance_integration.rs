//! Integration tests for balance sheet endpoints
//!
//! Requests go through the full router; the store is replaced by a backend
//! that records statements and replays canned rows.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt;

use tally_analytics::{AnalyticsEngine, MetricRegistry};
use tally_api::{AppState, build_router};
use tally_query::{QueryBackend, QueryError, QueryParams, QueryResult, Record};

#[derive(Clone, Default)]
struct RecordingBackend {
    rows: Vec<Record>,
    fail: bool,
    executed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl QueryBackend for RecordingBackend {
    async fn execute(&self, sql: &str, _params: &QueryParams) -> Result<QueryResult, QueryError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if self.fail {
            return Err(QueryError::Connection("10.0.0.5:8123 refused".to_string()));
        }
        Ok(QueryResult::from_records(self.rows.clone()))
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        if self.fail {
            return Err(QueryError::Connection("10.0.0.5:8123 refused".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn row(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("row must be an object"),
    }
}

fn test_app(backend: &RecordingBackend) -> Router {
    let registry = Arc::new(MetricRegistry::balance_sheet().unwrap());
    let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
    let engine = AnalyticsEngine::new(Box::new(backend.clone()), registry).with_today(today);
    build_router(AppState::new(engine))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(json!({})))
}

fn executed(backend: &RecordingBackend) -> Vec<String> {
    backend.executed.lock().unwrap().clone()
}

// =============================================================================
// Ungrouped
// =============================================================================

#[tokio::test]
async fn test_balance_sheet_returns_full_field_set() {
    let backend = RecordingBackend {
        rows: vec![row(json!({"sales": 1200.5, "sales_last_year": 1000, "sales_vs_last_year": 20.05}))],
        ..Default::default()
    };

    let (status, body) = get(
        test_app(&backend),
        "/api/v1/balance-sheet?start_date=2024-01-01&end_date=2024-03-31&metrics=sales",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_object().unwrap();
    let expected = MetricRegistry::balance_sheet()
        .unwrap()
        .all_response_field_names();
    assert_eq!(data.len(), expected.len());
    assert_eq!(data["sales"], json!(1200.5));
    assert_eq!(data["sales_last_year"], json!(1000.0));
    assert_eq!(data["stock_value"], json!(0.0));

    let sql = executed(&backend);
    assert_eq!(sql.len(), 1);
    assert!(sql[0].starts_with("WITH transactions_current AS ("));
}

#[tokio::test]
async fn test_filter_values_are_not_interpolated() {
    let backend = RecordingBackend::default();

    let (status, _) = get(
        test_app(&backend),
        "/api/v1/balance-sheet?brand=x%27%3B%20DROP%20TABLE%20transactions%3B%20--",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!executed(&backend)[0].contains("DROP"));
}

#[tokio::test]
async fn test_unknown_filter_column_rejected() {
    let backend = RecordingBackend::default();

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet?password=hunter2").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_FILTER");
    assert!(executed(&backend).is_empty());
}

#[tokio::test]
async fn test_unknown_operator_rejected() {
    let backend = RecordingBackend::default();

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet?brand%5Bapprox%5D=x").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_OPERATOR");
}

#[tokio::test]
async fn test_malformed_date_rejected() {
    let backend = RecordingBackend::default();

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet?start_date=01/02/2024").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_DATE");
}

#[tokio::test]
async fn test_unknown_metric_rejected() {
    let backend = RecordingBackend::default();

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet?metrics=revenue").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UNKNOWN_METRIC");
}

#[tokio::test]
async fn test_backend_failure_is_opaque() {
    let backend = RecordingBackend {
        fail: true,
        ..Default::default()
    };

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "QUERY_FAILED");
    assert_eq!(body["message"], "internal error");
}

// =============================================================================
// Grouped
// =============================================================================

#[tokio::test]
async fn test_grouped_pagination() {
    let rows = (50..100)
        .map(|i| {
            row(json!({
                "id": format!("s{}", i),
                "name": format!("Seller {}", i),
                "sales": 1000 - i,
                "_total_count": 120
            }))
        })
        .collect();
    let backend = RecordingBackend {
        rows,
        ..Default::default()
    };

    let (status, body) = get(
        test_app(&backend),
        "/api/v1/balance-sheet/grouped?group_by=seller_id&limit=50&page=2&metrics=sales",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 50);
    assert!(data.iter().all(|r| r["_total_count"] == json!(120)));
    assert_eq!(data[0]["id"], "s50");
    assert_eq!(data[0]["name"], "Seller 50");

    assert_eq!(body["meta"]["total"], 120);
    assert_eq!(body["meta"]["page"], 2);
    assert_eq!(body["meta"]["count"], 50);
    assert_eq!(body["meta"]["total_pages"], 3);
    assert_eq!(body["meta"]["group_by"], "seller_id");

    let sql = executed(&backend);
    assert!(sql[0].ends_with("LIMIT 50 OFFSET 50"));
}

#[tokio::test]
async fn test_grouped_requires_group_by() {
    let backend = RecordingBackend::default();

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet/grouped").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_grouped_rejects_unknown_dimension() {
    let backend = RecordingBackend::default();

    let (status, body) = get(
        test_app(&backend),
        "/api/v1/balance-sheet/grouped?group_by=weather",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_GROUP_BY");
    assert!(executed(&backend).is_empty());
}

#[tokio::test]
async fn test_grouped_rejects_zero_limit() {
    let backend = RecordingBackend::default();

    let (status, body) = get(
        test_app(&backend),
        "/api/v1/balance-sheet/grouped?group_by=brand&limit=0",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "OUT_OF_RANGE");
}

// =============================================================================
// Filter Values & Schema
// =============================================================================

#[tokio::test]
async fn test_filter_values() {
    let backend = RecordingBackend {
        rows: vec![
            row(json!({"value": "Apple"})),
            row(json!({"value": "Banana"})),
            row(json!({"value": "Cherry"})),
        ],
        ..Default::default()
    };

    let (status, body) = get(
        test_app(&backend),
        "/api/v1/balance-sheet/filters/brand/values?table=transactions&region=north",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["Apple", "Banana", "Cherry"]));
    assert!(executed(&backend)[0].contains("ORDER BY value ASC"));
}

#[tokio::test]
async fn test_filter_values_unknown_column() {
    let backend = RecordingBackend::default();

    let (status, body) = get(
        test_app(&backend),
        "/api/v1/balance-sheet/filters/seller_id/values?table=inventory",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UNKNOWN_COLUMN");
}

#[tokio::test]
async fn test_filter_values_requires_table() {
    let backend = RecordingBackend::default();

    let (status, _) = get(test_app(&backend), "/api/v1/balance-sheet/filters/brand/values").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schema() {
    let backend = RecordingBackend::default();

    let (status, body) = get(test_app(&backend), "/api/v1/balance-sheet/schema").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["row"]["properties"]["sales"]["type"], "number");
    assert_eq!(body["data"]["grouped_row"]["properties"]["id"]["type"], "string");
    assert!(executed(&backend).is_empty());
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (status, body) = get(test_app(&RecordingBackend::default()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "recording");

    let failing = RecordingBackend {
        fail: true,
        ..Default::default()
    };
    let (status, body) = get(test_app(&failing), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["backend_reachable"], false);
}
