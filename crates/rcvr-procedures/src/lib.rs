//! ---
//! rcvr_section: "05-procedures"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Shipped recovery procedures and their registration."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Executors for the standard procedure set and the wiring that registers
//! them with an orchestrator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rcvr_catalog::{RecoveryProcedure, Severity};
use rcvr_common::{CredentialProbe, ProceduresConfig};
use rcvr_orchestrator::RecoveryOrchestrator;
use tracing::info;

pub mod credentials;
pub mod data;
pub mod scan;
pub mod website;

pub use credentials::CredentialFailover;
pub use data::DataRecovery;
pub use scan::FilesystemScan;
pub use website::WebsiteRecovery;

pub const WEBSITE_RECOVERY: &str = "website_recovery";
pub const DATA_RECOVERY: &str = "data_recovery";
pub const CREDENTIAL_FAILOVER: &str = "credential_failover";
pub const FILESYSTEM_SCAN: &str = "filesystem_scan";

/// Build the standard procedure set.
pub fn standard_procedures(
    config: &ProceduresConfig,
    credentials: Arc<dyn CredentialProbe>,
) -> Result<Vec<RecoveryProcedure>> {
    let website = WebsiteRecovery::new(&config.website).context("failed to build website recovery executor")?;

    Ok(vec![
        RecoveryProcedure::new(WEBSITE_RECOVERY, "Website Recovery", Arc::new(website))
            .with_description("Re-probe the public site and confirm it answers with a 2xx status.")
            .with_severity(Severity::Medium)
            .with_estimated_duration(Duration::from_secs(60))
            .with_auto_execute(true)
            .with_steps([
                "Probe the site URL",
                "Wait for the retry delay",
                "Re-probe and confirm availability",
            ]),
        RecoveryProcedure::new(
            DATA_RECOVERY,
            "Data Recovery",
            Arc::new(DataRecovery::new(&config.data)),
        )
        .with_description("Restore the newest verified backup into the restore directory.")
        .with_severity(Severity::Critical)
        .with_estimated_duration(Duration::from_secs(600))
        .with_auto_execute(false)
        .with_prerequisite("backup_access")
        .with_steps([
            "Locate the newest backup",
            "Verify backup integrity",
            "Copy the backup into the restore directory",
        ]),
        RecoveryProcedure::new(
            CREDENTIAL_FAILOVER,
            "Credential Failover",
            Arc::new(CredentialFailover::new(&config.credentials, credentials)),
        )
        .with_description("Select the first usable credential from the configured candidates.")
        .with_severity(Severity::High)
        .with_estimated_duration(Duration::from_secs(30))
        .with_auto_execute(true)
        .with_prerequisite("github_access")
        .with_steps([
            "Walk the candidate credentials in order",
            "Validate endpoint-style credentials",
            "Record the selected credential",
        ]),
        RecoveryProcedure::new(
            FILESYSTEM_SCAN,
            "Filesystem Scan",
            Arc::new(FilesystemScan::new(&config.scan)),
        )
        .with_description("Scan the data directory for empty or unparsable JSON files.")
        .with_severity(Severity::Medium)
        .with_estimated_duration(Duration::from_secs(300))
        .with_auto_execute(true)
        .with_steps(["Walk the scan directory", "Report corrupted files"]),
    ])
}

/// Register the standard procedure set with `orchestrator`.
pub fn register_standard_procedures(
    orchestrator: &RecoveryOrchestrator,
    config: &ProceduresConfig,
    credentials: Arc<dyn CredentialProbe>,
) -> Result<()> {
    for procedure in standard_procedures(config, credentials)? {
        let id = procedure.id.clone();
        orchestrator
            .register_procedure(procedure)
            .with_context(|| format!("failed to register procedure {id}"))?;
    }
    info!(count = orchestrator.catalog().len(), "standard recovery procedures registered");
    Ok(())
}
