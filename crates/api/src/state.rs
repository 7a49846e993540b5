//! Application state
//!
//! Shared state for API handlers.

use std::sync::Arc;

use tally_analytics::{AnalyticsEngine, MetricRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Analytics engine for balance-sheet queries
    pub engine: Arc<AnalyticsEngine>,
}

impl AppState {
    /// Create new application state
    pub fn new(engine: AnalyticsEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Registry the engine was built with
    pub fn registry(&self) -> &MetricRegistry {
        self.engine.registry()
    }
}
