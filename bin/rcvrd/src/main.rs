//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "binary"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Binary entrypoint for the RCVR daemon."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rcvr_common::config::AppConfig;
use rcvr_common::logging::init_tracing;
use rcvr_common::{CredentialProbe, EnvCredentialStore};
use rcvr_health::{check_from_config, HealthScheduler};
use rcvr_metrics::{new_registry, spawn_http_server, RecoveryMetrics, StatusProvider};
use rcvr_orchestrator::{control_router, RecoveryOrchestrator};
use rcvr_procedures::register_standard_procedures;
use serde_json::json;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "RCVR incident recovery daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run health checks and recoveries until interrupted")]
    Run,
    #[command(about = "Validate the configuration and exit")]
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/rcvr.toml"));
    candidates.push(PathBuf::from("configs/rcvr.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", loaded.source.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_tracing("rcvrd", &config.logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
            run_daemon(config).await
        }
        Commands::CheckConfig => {
            println!(
                "{}: ok ({} health checks, {} prerequisites)",
                loaded.source.display(),
                config.health_checks.len(),
                config.prerequisites.len()
            );
            Ok(())
        }
    }
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let registry = new_registry();
    let metrics = RecoveryMetrics::new(registry.clone())?;
    let credentials: Arc<dyn CredentialProbe> =
        Arc::new(EnvCredentialStore::new(config.credentials.clone()));

    let orchestrator =
        Arc::new(RecoveryOrchestrator::from_config(&config).with_metrics(metrics.clone()));
    register_standard_procedures(&orchestrator, &config.procedures, credentials.clone())?;

    let scheduler = Arc::new(HealthScheduler::new().with_metrics(metrics));
    for check_config in &config.health_checks {
        match check_from_config(check_config, &orchestrator, credentials.clone()) {
            Ok(check) => scheduler.register(check)?,
            Err(err) => error!(check = %check_config.id, error = %err, "health check skipped"),
        }
    }
    scheduler.start();

    let status: StatusProvider = {
        let orchestrator = orchestrator.clone();
        let scheduler = scheduler.clone();
        Arc::new(move || {
            json!({
                "orchestrator": serde_json::to_value(orchestrator.status()).unwrap_or_default(),
                "health_checks": scheduler.active_checks(),
            })
        })
    };
    // rcvrctl sends recover/resolve here, so the server runs even with metrics off
    let exported = config.metrics.enabled.then(|| registry.clone());
    if exported.is_none() {
        info!("prometheus exporter disabled by configuration");
    }
    let server = spawn_http_server(
        exported,
        status,
        control_router(orchestrator.clone()),
        config.metrics.listen,
    )?;
    info!(address = %server.addr(), "status and control endpoint listening");

    let status = orchestrator.status();
    info!(
        procedures = status.catalog_size,
        active_incidents = status.active_incidents,
        health_checks = scheduler.active_checks().len(),
        "daemon running; waiting for termination signal"
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    scheduler.stop_all().await;
    if let Err(err) = server.shutdown().await {
        warn!(error = %err, "http endpoint did not shut down cleanly");
    }
    Ok(())
}
