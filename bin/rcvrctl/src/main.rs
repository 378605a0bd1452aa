//! ---
//! rcvr_section: "06-operator-interfaces"
//! rcvr_subsection: "binary"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Operator CLI for inspecting and driving recoveries."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rcvr_catalog::RecoveryContext;
use rcvr_common::config::AppConfig;
use rcvr_common::logging::init_cli_tracing;
use rcvr_common::{CredentialProbe, EnvCredentialStore};
use rcvr_orchestrator::RecoveryOrchestrator;
use rcvr_procedures::register_standard_procedures;

use crate::remote::DaemonClient;

mod commands;
mod remote;

/// Process exit codes.
pub(crate) const EXIT_OK: u8 = 0;
pub(crate) const EXIT_FAILED: u8 = 1;
pub(crate) const EXIT_UNKNOWN: u8 = 2;

#[derive(Debug, Parser)]
#[command(author, version, about = "RCVR operator control utility", long_about = None)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit JSON instead of text")]
    json: bool,

    #[arg(
        long,
        global = true,
        help = "Run recover/resolve in this process instead of through a running daemon"
    )]
    local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Show incident counts, success rate and catalog size")]
    Status,
    #[command(about = "Run a recovery procedure now")]
    Recover {
        procedure_id: String,
        #[arg(long, value_name = "JSON", help = "JSON object passed to the executor")]
        context: Option<String>,
    },
    #[command(about = "Evaluate a procedure's prerequisites without running it")]
    Test { procedure_id: String },
    #[command(about = "List active incidents and recent history")]
    Incidents {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    #[command(about = "List registered recovery procedures")]
    Procedures,
    #[command(about = "Close an open incident")]
    Resolve {
        incident_id: String,
        #[arg(long, help = "Record the incident as failed instead of completed")]
        failed: bool,
        #[arg(long, default_value = "resolved by operator")]
        message: String,
    },
    #[command(about = "Run one configured health check once")]
    Check { check_id: String },
}

pub(crate) struct Runtime {
    pub config: AppConfig,
    pub credentials: Arc<dyn CredentialProbe>,
    pub orchestrator: Arc<RecoveryOrchestrator>,
    /// `None` with `--local`.
    pub daemon: Option<DaemonClient>,
    pub json: bool,
}

fn load_runtime(config_path: Option<PathBuf>, json: bool, local: bool) -> Result<Runtime> {
    let mut candidates = Vec::new();
    if let Some(path) = config_path {
        candidates.push(path);
    }
    candidates.push(PathBuf::from("configs/rcvr.toml"));
    candidates.push(PathBuf::from("configs/rcvr.dev.toml"));

    let config = AppConfig::load(&candidates)?;
    config.validate()?;
    let credentials: Arc<dyn CredentialProbe> =
        Arc::new(EnvCredentialStore::new(config.credentials.clone()));
    let orchestrator = RecoveryOrchestrator::from_config(&config);
    register_standard_procedures(&orchestrator, &config.procedures, credentials.clone())?;
    let daemon = if local {
        None
    } else {
        Some(DaemonClient::new(config.metrics.listen)?)
    };
    Ok(Runtime {
        config,
        credentials,
        orchestrator: Arc::new(orchestrator),
        daemon,
        json,
    })
}

fn parse_context(raw: Option<&str>) -> Result<RecoveryContext> {
    match raw {
        None => Ok(RecoveryContext::new()),
        Some(raw) => serde_json::from_str(raw).context("--context must be a JSON object"),
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let runtime = load_runtime(cli.config, cli.json, cli.local)?;
    match cli.command {
        Commands::Status => commands::status(&runtime),
        Commands::Recover {
            procedure_id,
            context,
        } => {
            let context = parse_context(context.as_deref())?;
            commands::recover(&runtime, &procedure_id, context).await
        }
        Commands::Test { procedure_id } => commands::test(&runtime, &procedure_id),
        Commands::Incidents { limit } => commands::incidents(&runtime, limit),
        Commands::Procedures => commands::procedures(&runtime),
        Commands::Resolve {
            incident_id,
            failed,
            message,
        } => commands::resolve(&runtime, &incident_id, !failed, &message).await,
        Commands::Check { check_id } => commands::check(&runtime, &check_id).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_cli_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}
