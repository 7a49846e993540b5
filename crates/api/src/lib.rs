//! Tally API
//!
//! HTTP API for balance-sheet analytics.
//!
//! # Overview
//!
//! This crate provides the REST API over `tally-analytics`. It's built on
//! Axum; handlers parse the query string, hand a typed request to the
//! [`AnalyticsEngine`](tally_analytics::AnalyticsEngine) and wrap the result.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tally_analytics::{AnalyticsEngine, MetricRegistry};
//! use tally_api::{build_router, AppState};
//!
//! let engine = AnalyticsEngine::new(backend, Arc::new(MetricRegistry::balance_sheet()?));
//! let app = build_router(AppState::new(engine));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Endpoints
//!
//! - `GET /api/v1/balance-sheet` - Current period vs last year, `{data}`
//! - `GET /api/v1/balance-sheet/grouped` - Per-group rows, `{data, meta}`
//! - `GET /api/v1/balance-sheet/filters/{column}/values?table=` - Distinct values
//! - `GET /api/v1/balance-sheet/schema` - Response JSON schema
//! - `GET /health` - Backend reachability
//!
//! # Query Parameters
//!
//! - `start_date`, `end_date` - `YYYY-MM-DD`, inclusive
//! - `metrics` - Comma-separated base metric aliases (default: all)
//! - `group_by` - Grouping dimension (grouped endpoint only)
//! - `page` or `offset`, `limit` - Pagination
//! - `order_by`, `order_direction` - Sort field and `asc`/`desc`
//! - anything else - Column filter, `column=value` or `column[op]=value`

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

// Re-exports
pub use error::{ApiError, Result};
pub use routes::{RouterOptions, build_router, build_router_with_options};
pub use state::AppState;
pub use types::{ApiResponse, BalanceSheetParams, PagedResponse, ValuesParams};
