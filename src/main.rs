//! redfish-collector - Redfish metrics poller
//!
//! Loads the configuration, connects every service and runs a polling cycle
//! on each tick until interrupted. Samples go to stdout as JSON lines.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use redfish_collector::builder::load_config;
use redfish_collector::cli::{Cli, OutputFormat};
use redfish_collector::client::HttpConnector;
use redfish_collector::config::Config;
use redfish_collector::error::{AppError, AppResult};
use redfish_collector::model::Registry;
use redfish_collector::scheduler::Poller;
use redfish_collector::sink::JsonLinesSink;

#[derive(Serialize)]
struct ServiceSummary<'a> {
    name: &'a str,
    host: &'a str,
    queries: &'a [String],
}

#[derive(Serialize)]
struct ValidationSummary<'a> {
    valid: bool,
    interval_secs: u64,
    queries: Vec<&'a str>,
    services: Vec<ServiceSummary<'a>>,
}

fn print_summary(config: &Config, registry: &Registry, format: OutputFormat) -> Result<()> {
    let summary = ValidationSummary {
        valid: true,
        interval_secs: config.interval_secs,
        queries: registry.queries().iter().map(|q| q.name()).collect(),
        services: registry
            .services()
            .iter()
            .map(|s| ServiceSummary {
                name: s.name(),
                host: s.host(),
                queries: s.queries(),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("Configuration is valid");
            println!("  interval: {}s", summary.interval_secs);
            println!("  queries: {}", summary.queries.join(", "));
            for service in &summary.services {
                println!(
                    "  service {} ({}): {}",
                    service.name,
                    service.host,
                    service.queries.join(", ")
                );
            }
        }
    }
    Ok(())
}

/// Read the settings file, apply CLI overrides and build the registry
fn load(cli: &Cli) -> AppResult<(Config, Registry)> {
    let mut config = Config::load(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let registry = load_config(&config.redfish)?;
    Ok((config, registry))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    redfish_collector::init_logging(&cli.log_level.to_string())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting redfish-collector"
    );

    let (config, mut registry) = load(&cli)?;

    if cli.validate {
        registry
            .resolve()
            .map_err(|e| AppError::Init(e.into()))?;
        print_summary(&config, &registry, cli.output_format)?;
        return Ok(());
    }

    let connector = HttpConnector::new(config.timeout_ms, config.verify_peer);
    let sink = Arc::new(JsonLinesSink::new(std::io::stdout()));
    let mut poller = Poller::initialize(registry, &connector, sink).map_err(AppError::from)?;
    let grace = Duration::from_millis(config.shutdown_grace_ms);

    if cli.once {
        poller.run_cycle().map_err(AppError::from)?;
        let limit = Duration::from_millis(config.timeout_ms) + grace;
        if !poller.wait_idle(limit).await {
            warn!("Some fetches did not complete in time");
        }
        poller.shutdown(grace).await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(interval_secs = config.interval_secs, "Polling started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poller.run_cycle().map_err(AppError::from)?;
            }
            _ = &mut shutdown => break,
        }
    }

    poller.shutdown(grace).await;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
