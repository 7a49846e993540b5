//! Query command - Run a balance-sheet query from the command line
//!
//! Takes the same parameters as the HTTP API and prints the JSON response.
//!
//! # Usage
//!
//! ```bash
//! tally query --start-date 2024-01-01 --end-date 2024-03-31
//! tally query --group-by seller_id --order-by sales --limit 10
//! tally query --metrics sales --filter brand=Apple,Banana --filter "region[ne]=north"
//! tally query --group-by brand --dry-run   # print SQL and parameters only
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde_json::json;
use tally_analytics::MetricRegistry;
use tally_analytics::yoy::{BuiltQuery, grouped_yoy_query, yoy_query};
use tally_api::BalanceSheetParams;

use crate::cmd::{build_engine, load_config, load_registry};

/// Query command arguments
#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Period start, YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,

    /// Period end, YYYY-MM-DD
    #[arg(long)]
    end_date: Option<String>,

    /// Comma-separated base metrics (default: all)
    #[arg(short, long)]
    metrics: Option<String>,

    /// Group rows by this dimension
    #[arg(short, long)]
    group_by: Option<String>,

    /// Page size for grouped queries
    #[arg(long)]
    limit: Option<u32>,

    /// Rows to skip for grouped queries
    #[arg(long)]
    offset: Option<u32>,

    /// Sort field for grouped queries
    #[arg(long)]
    order_by: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long)]
    order_direction: Option<String>,

    /// Column filter as `column=value` or `column[op]=value` (repeatable)
    #[arg(short, long = "filter", value_name = "FILTER")]
    filters: Vec<String>,

    /// Print the generated SQL and parameters instead of running it
    #[arg(long)]
    dry_run: bool,
}

impl QueryArgs {
    /// Flatten into the query-string shape the API parses
    fn to_raw(&self) -> Result<BTreeMap<String, String>> {
        let mut raw = BTreeMap::new();

        for filter in &self.filters {
            let (key, value) = filter
                .split_once('=')
                .with_context(|| format!("filter '{}' must be column=value", filter))?;
            raw.insert(key.trim().to_string(), value.to_string());
        }

        let known = [
            ("start_date", self.start_date.clone()),
            ("end_date", self.end_date.clone()),
            ("metrics", self.metrics.clone()),
            ("group_by", self.group_by.clone()),
            ("limit", self.limit.map(|v| v.to_string())),
            ("offset", self.offset.map(|v| v.to_string())),
            ("order_by", self.order_by.clone()),
            ("order_direction", self.order_direction.clone()),
        ];
        for (key, value) in known {
            if let Some(value) = value {
                raw.insert(key.to_string(), value);
            }
        }

        Ok(raw)
    }
}

/// Run the query command
pub async fn run(config_path: Option<&Path>, args: QueryArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = load_registry(&config)?;
    let params = BalanceSheetParams::from_query(args.to_raw()?)?;

    if args.dry_run {
        let query = build_sql(&registry, &params)?;
        let output = match query {
            Some(query) => json!({
                "sql": query.sql,
                "params": query.params.iter().map(|p| json!({
                    "name": p.name,
                    "type": p.param_type.as_str(),
                    "value": p.value,
                })).collect::<Vec<_>>(),
                "skipped_tables": query.skipped_tables,
                "calculated": query.calculated,
            }),
            None => json!({ "sql": null, "reason": "no requested table has the grouping dimension" }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let engine = build_engine(&config, registry)?;
    let output = if params.group_by.is_some() {
        let request = params.grouped_request(engine.registry())?;
        let result = engine.build_grouped_multi_table_yoy_query(&request).await?;
        json!({ "data": result.rows, "meta": result.meta })
    } else {
        let request = params.yoy_request(engine.registry())?;
        let values = engine.build_multi_table_yoy_query(&request).await?;
        json!({ "data": values })
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn build_sql(registry: &MetricRegistry, params: &BalanceSheetParams) -> Result<Option<BuiltQuery>> {
    let today = Utc::now().date_naive();
    if params.group_by.is_some() {
        let request = params.grouped_request(registry)?;
        Ok(grouped_yoy_query(registry, &request, today)?)
    } else {
        let request = params.yoy_request(registry)?;
        Ok(Some(yoy_query(registry, &request, today)?))
    }
}
