//! statusd - service-health aggregator daemon

use anyhow::{Context, Result};
use clap::Parser;
use statusd::{AppState, Config, Orchestrator, RefreshCycle, Scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "statusd", version, about = "Service-health aggregator daemon")]
struct Args {
    /// Config file (overrides $STATUSD_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default config file to PATH and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if let Some(path) = args.init_config {
        Config::save_default(&path)?;
        return Ok(());
    }

    let config = match args.config {
        Some(path) => {
            let mut config = Config::load_from_path(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => Config::load()?,
    };

    info!("statusd v{} starting", env!("CARGO_PKG_VERSION"));

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    info!(
        services = orchestrator.catalogue().len(),
        "Catalogue loaded"
    );

    let mut state = AppState::new(Arc::clone(&orchestrator), config.request_budget());
    let scheduler = if config.scheduler.enabled {
        let cycle = RefreshCycle::from_config(Arc::clone(&orchestrator), &config.scheduler)?;
        let scheduler = Arc::new(Scheduler::new(Arc::new(cycle)));
        scheduler.start(config.tick_interval());
        state = state.with_scheduler(Arc::clone(&scheduler));
        Some(scheduler)
    } else {
        info!("Scheduler disabled by configuration");
        None
    };

    statusd::server::run(state, &config.server.bind, shutdown_signal()).await?;

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
