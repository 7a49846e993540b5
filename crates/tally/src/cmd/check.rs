//! Check command - Validate configuration and the metric registry
//!
//! Loads the config and registry exactly as `serve` would, then prints the
//! registry summary and any diagnostics. Exits non-zero when either fails to
//! load.

use std::path::Path;

use anyhow::Result;

use crate::cmd::{load_config, load_registry};

/// Run the check command
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = load_registry(&config)?;

    println!(
        "registry: {} tables, {} base metrics, {} calculated metrics",
        registry.tables().len(),
        registry.base_metrics().len(),
        registry.calculated_metrics().len()
    );
    println!("group by: {}", registry.allowed_group_by().join(", "));
    println!("filters:  {}", registry.filterable_columns().join(", "));

    let diagnostics = registry.diagnose();
    if diagnostics.is_empty() {
        println!("no issues found");
    } else {
        for diagnostic in &diagnostics {
            println!("warning: {}", diagnostic);
        }
    }

    Ok(())
}
