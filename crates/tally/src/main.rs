//! Tally - Balance-sheet year-over-year analytics
//!
//! # Usage
//!
//! ```bash
//! # Run the API server (default)
//! tally
//! tally --config configs/tally.toml
//!
//! # Run one query from the command line
//! tally query --start-date 2024-01-01 --end-date 2024-03-31 --metrics sales,gross_margin
//! tally query --group-by seller_id --limit 10 --filter region=north
//!
//! # Validate the metric registry
//! tally check
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_config::{Config, LogFormat, LogLevel};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tally - Balance-sheet year-over-year analytics
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the API server
    Serve(cmd::serve::ServeArgs),

    /// Run a balance-sheet query and print the result as JSON
    Query(cmd::query::QueryArgs),

    /// Validate configuration and the metric registry
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Command::Serve(args)) => {
            let (level, format) = resolve_logging(cli.log_level.as_deref(), config_path);
            init_logging(&level, format)?;
            cmd::serve::run(config_path, args).await
        }
        Some(Command::Query(args)) => {
            // Query prints JSON to stdout; logs only when asked for
            let level = cli.log_level.as_deref().unwrap_or("warn");
            init_logging(level, LogFormat::Console)?;
            cmd::query::run(config_path, args).await
        }
        Some(Command::Check) => {
            let level = cli.log_level.as_deref().unwrap_or("warn");
            init_logging(level, LogFormat::Console)?;
            cmd::check::run(config_path)
        }
        // No subcommand = run server (default behavior)
        None => {
            let (level, format) = resolve_logging(cli.log_level.as_deref(), config_path);
            init_logging(&level, format)?;
            cmd::serve::run(config_path, cmd::serve::ServeArgs::default()).await
        }
    }
}

/// Resolve log level and format: CLI flag > config file > default "info"
fn resolve_logging(
    cli_level: Option<&str>,
    config_path: Option<&std::path::Path>,
) -> (String, LogFormat) {
    let config = config_path
        .filter(|path| path.exists())
        .and_then(|path| Config::from_file(path).ok());

    let format = config.as_ref().map(|c| c.log.format).unwrap_or_default();

    // CLI flag takes precedence; anything that is not a plain level is
    // passed through as a raw EnvFilter directive
    if let Some(level) = cli_level {
        let directive = level
            .parse::<LogLevel>()
            .map(|l| l.filter_directive())
            .unwrap_or_else(|_| level.to_string());
        return (directive, format);
    }

    let level = config.as_ref().map(|c| c.log.level).unwrap_or_default();
    (level.filter_directive(), format)
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    // Logs go to stderr so command output on stdout stays clean
    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }

    Ok(())
}
