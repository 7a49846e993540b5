//! Shared fixtures for analytics tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tally_query::{QueryBackend, QueryError, QueryParams, QueryResult, Record};

use crate::registry::MetricRegistry;

/// Fixed "today" so open-ended periods are deterministic
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

pub fn registry() -> MetricRegistry {
    MetricRegistry::balance_sheet().unwrap()
}

/// Build a record from `(name, value)` pairs
pub fn record(fields: &[(&str, Value)]) -> Record {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A statement the mock backend received
#[derive(Debug, Clone)]
pub struct Executed {
    pub sql: String,
    pub params: QueryParams,
}

/// Backend that records statements and replays canned rows
#[derive(Clone, Default)]
pub struct MockBackend {
    rows: Vec<Record>,
    fail: bool,
    executed: Arc<Mutex<Vec<Executed>>>,
}

impl MockBackend {
    pub fn returning(rows: Vec<Record>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Handle to the statements executed so far
    pub fn log(&self) -> Arc<Mutex<Vec<Executed>>> {
        Arc::clone(&self.executed)
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn execute(&self, sql: &str, params: &QueryParams) -> Result<QueryResult, QueryError> {
        self.executed.lock().unwrap().push(Executed {
            sql: sql.to_string(),
            params: params.clone(),
        });
        if self.fail {
            return Err(QueryError::Connection("connection refused".to_string()));
        }
        Ok(QueryResult::from_records(self.rows.clone()))
    }

    async fn health_check(&self) -> Result<(), QueryError> {
        if self.fail {
            return Err(QueryError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
