//! Serve command - Run the Tally API server

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tally_api::{AppState, RouterOptions, build_router_with_options};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::cmd::{build_engine, load_config, load_registry};

/// Serve command arguments
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to (overrides [api_server] host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides [api_server] port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the serve command
pub async fn run(config_path: Option<&Path>, args: ServeArgs) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "Tally starting"
    );

    let mut config = load_config(config_path)?;
    if let Some(host) = args.host {
        config.api_server.host = host;
    }
    if let Some(port) = args.port {
        config.api_server.port = port;
    }

    let registry = load_registry(&config)?;
    let engine = build_engine(&config, registry)?;

    if let Err(e) = engine.health_check().await {
        // Keep serving; /health reports the backend state
        error!(error = %e, "query backend unreachable at startup");
    }

    let options = RouterOptions {
        cors_origins: config.api_server.cors_origins.clone(),
    };
    let app = build_router_with_options(AppState::new(engine), options);

    let addr = config
        .api_server
        .bind_addr()
        .context("invalid bind address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    info!(
        address = %addr,
        cors = !config.api_server.cors_origins.is_empty(),
        cors_any_origin = config.api_server.cors_any_origin(),
        "Tally API server starting"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("server error")?;

    info!("Tally shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server...");
}
