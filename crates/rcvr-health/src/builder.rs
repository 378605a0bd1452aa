//! ---
//! rcvr_section: "04-health"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Construction of health checks from configuration."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::sync::Arc;

use rcvr_common::{CredentialProbe, HealthCheckConfig, ProbeConfig, UnhealthyAction};
use rcvr_orchestrator::RecoveryOrchestrator;

use crate::check::{HealthCheck, HealthProbe, UnhealthyHandler};
use crate::handlers::{LogOnly, RaiseManualIncident, TriggerProcedure};
use crate::probes::{CredentialProbeCheck, HttpProbe, PathProbe};
use crate::HealthError;

/// Build a [`HealthCheck`] from a `[[health_checks]]` entry.
///
/// Trigger handlers must name a procedure already registered with the
/// orchestrator.
pub fn check_from_config(
    config: &HealthCheckConfig,
    orchestrator: &Arc<RecoveryOrchestrator>,
    credentials: Arc<dyn CredentialProbe>,
) -> Result<HealthCheck, HealthError> {
    config.validate().map_err(|err| HealthError::Invalid {
        id: config.id.clone(),
        reason: err.to_string(),
    })?;

    let probe: Arc<dyn HealthProbe> = match &config.probe {
        ProbeConfig::Http { url } => Arc::new(HttpProbe::new(url.clone(), config.timeout)?),
        ProbeConfig::Path { path, writable } => Arc::new(PathProbe::new(path.clone(), *writable)),
        ProbeConfig::Credential { credential } => {
            Arc::new(CredentialProbeCheck::new(credential.clone(), credentials))
        }
    };

    let handler: Arc<dyn UnhealthyHandler> = match &config.on_unhealthy {
        UnhealthyAction::Log => Arc::new(LogOnly),
        UnhealthyAction::Trigger(procedure) => {
            if !orchestrator.catalog().contains(procedure) {
                return Err(HealthError::UnknownProcedure {
                    check: config.id.clone(),
                    procedure: procedure.clone(),
                });
            }
            Arc::new(TriggerProcedure::new(orchestrator.clone(), procedure.clone()))
        }
        UnhealthyAction::Manual { name, severity } => Arc::new(RaiseManualIncident::new(
            orchestrator.clone(),
            name.clone(),
            *severity,
        )),
    };

    Ok(HealthCheck::new(config.id.clone(), config.interval, probe, handler).with_timeout(config.timeout))
}
