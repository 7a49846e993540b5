//! Command implementations for the Tally CLI

pub mod check;
pub mod query;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_analytics::{AnalyticsEngine, MetricRegistry};
use tally_config::Config;
use tally_query::ClickHouseBackend;
use tracing::{info, warn};

/// Config files tried, in order, when `--config` is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["configs/tally.toml", "tally.toml"];

/// Load configuration
///
/// An explicit path must exist. Without one, the default paths are tried and
/// built-in defaults are used if none exists.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if candidate.exists() {
            info!(config = %candidate.display(), "using config file");
            return Config::from_file(&candidate).with_context(|| {
                format!("failed to load configuration from {}", candidate.display())
            });
        }
    }

    info!("no config file found, using defaults");
    Ok(Config::default())
}

/// Load the metric registry named by the config, or the built-in one
pub fn load_registry(config: &Config) -> Result<MetricRegistry> {
    let registry = match config.analytics.registry_file {
        Some(ref path) => MetricRegistry::from_file(path)
            .with_context(|| format!("failed to load metric registry from {}", path.display()))?,
        None => MetricRegistry::balance_sheet().context("built-in registry is invalid")?,
    };

    for diagnostic in registry.diagnose() {
        warn!(%diagnostic, "metric registry");
    }

    Ok(registry)
}

/// Build the analytics engine over ClickHouse
pub fn build_engine(config: &Config, registry: MetricRegistry) -> Result<AnalyticsEngine> {
    let backend =
        ClickHouseBackend::new(&config.query).context("failed to create ClickHouse backend")?;

    info!(
        url = %config.query.url,
        database = %config.query.database,
        tables = registry.tables().len(),
        base_metrics = registry.base_metrics().len(),
        calculated_metrics = registry.calculated_metrics().len(),
        "analytics engine initialized"
    );

    Ok(AnalyticsEngine::new(Box::new(backend), Arc::new(registry)))
}
