//! Balance sheet API routes
//!
//! - `GET /` - current vs last year, one row
//! - `GET /grouped` - the same split by a dimension, paginated
//! - `GET /filters/{column}/values` - distinct values for filter pickers
//! - `GET /schema` - JSON schema of the response rows

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use schemars::schema::RootSchema;
use serde::Serialize;
use tally_analytics::{
    GroupedRow, MetricValues, PageMeta, grouped_row_schema, response_schema,
};

use crate::error::Result;
use crate::state::AppState;
use crate::types::{ApiResponse, BalanceSheetParams, PagedResponse, ValuesParams};

/// Build the balance sheet router
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_balance_sheet))
        .route("/grouped", get(get_grouped_balance_sheet))
        .route("/filters/{column}/values", get(get_filter_values))
        .route("/schema", get(get_schema))
}

/// Response schemas for both endpoint shapes
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub row: RootSchema,
    pub grouped_row: RootSchema,
}

/// GET /api/v1/balance-sheet
async fn get_balance_sheet(
    State(state): State<AppState>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<MetricValues>>> {
    let params = BalanceSheetParams::from_query(raw)?;
    let request = params.yoy_request(state.registry())?;
    let data = state.engine.build_multi_table_yoy_query(&request).await?;
    Ok(Json(ApiResponse::new(data)))
}

/// GET /api/v1/balance-sheet/grouped
async fn get_grouped_balance_sheet(
    State(state): State<AppState>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Json<PagedResponse<Vec<GroupedRow>, PageMeta>>> {
    let params = BalanceSheetParams::from_query(raw)?;
    let request = params.grouped_request(state.registry())?;
    let result = state
        .engine
        .build_grouped_multi_table_yoy_query(&request)
        .await?;
    Ok(Json(PagedResponse::new(result.rows, result.meta)))
}

/// GET /api/v1/balance-sheet/filters/{column}/values
async fn get_filter_values(
    State(state): State<AppState>,
    Path(column): Path<String>,
    Query(raw): Query<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    let params = ValuesParams::from_query(raw)?;
    let request = params.request(&column, state.registry())?;
    let data = state.engine.build_distinct_values_query(&request).await?;
    Ok(Json(ApiResponse::new(data)))
}

/// GET /api/v1/balance-sheet/schema
async fn get_schema(State(state): State<AppState>) -> Json<ApiResponse<SchemaResponse>> {
    let registry = state.registry();
    Json(ApiResponse::new(SchemaResponse {
        row: response_schema(registry),
        grouped_row: grouped_row_schema(registry),
    }))
}
