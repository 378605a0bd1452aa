//! ---
//! rcvr_section: "04-health"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Reactions to unhealthy verdicts."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use rcvr_catalog::RecoveryContext;
use rcvr_common::Severity;
use rcvr_logging::{rcvr_debug, rcvr_info, rcvr_warn, LogContext};
use rcvr_orchestrator::{RecoveryOrchestrator, TriggerReport};
use serde_json::json;
use tokio::sync::mpsc;

use crate::check::{HealthVerdict, UnhealthyHandler};

fn context_for(check_id: &str, verdict: &HealthVerdict) -> RecoveryContext {
    let mut context = RecoveryContext::new();
    context.insert("source".into(), json!("health_check"));
    context.insert("check".into(), json!(check_id));
    context.insert("verdict".into(), verdict.details.clone());
    context
}

/// Starts a recovery procedure on its own task so the probe loop is not
/// blocked by a long recovery. Duplicate starts are deduplicated by the
/// orchestrator.
pub struct TriggerProcedure {
    orchestrator: Arc<RecoveryOrchestrator>,
    procedure_id: String,
    reports: Option<mpsc::UnboundedSender<TriggerReport>>,
}

impl TriggerProcedure {
    pub fn new(orchestrator: Arc<RecoveryOrchestrator>, procedure_id: impl Into<String>) -> Self {
        Self {
            orchestrator,
            procedure_id: procedure_id.into(),
            reports: None,
        }
    }

    /// Forward every trigger report to `sink` once the recovery finishes.
    pub fn with_reports(mut self, sink: mpsc::UnboundedSender<TriggerReport>) -> Self {
        self.reports = Some(sink);
        self
    }

    pub fn procedure_id(&self) -> &str {
        &self.procedure_id
    }
}

#[async_trait]
impl UnhealthyHandler for TriggerProcedure {
    async fn on_unhealthy(&self, check_id: &str, verdict: &HealthVerdict) {
        let orchestrator = self.orchestrator.clone();
        let procedure_id = self.procedure_id.clone();
        let check = check_id.to_string();
        let context = context_for(check_id, verdict);
        let reports = self.reports.clone();

        tokio::spawn(async move {
            let report = orchestrator.trigger(&procedure_id, context).await;
            rcvr_debug!(
                context = LogContext::new().with_procedure(&procedure_id).with_check(&check),
                disposition = report.disposition.as_str(),
                "health-triggered recovery finished"
            );
            if let Some(sink) = reports {
                let _ = sink.send(report);
            }
        });
    }
}

/// Opens a manual incident for an operator, unless one with the same name is
/// already open.
pub struct RaiseManualIncident {
    orchestrator: Arc<RecoveryOrchestrator>,
    name: String,
    severity: Severity,
}

impl RaiseManualIncident {
    pub fn new(orchestrator: Arc<RecoveryOrchestrator>, name: impl Into<String>, severity: Severity) -> Self {
        Self {
            orchestrator,
            name: name.into(),
            severity,
        }
    }
}

#[async_trait]
impl UnhealthyHandler for RaiseManualIncident {
    async fn on_unhealthy(&self, check_id: &str, verdict: &HealthVerdict) {
        let context = context_for(check_id, verdict);
        if self
            .orchestrator
            .raise_manual_incident(&self.name, self.severity, context)
            .is_none()
        {
            rcvr_info!(
                context = LogContext::new().with_check(check_id),
                "manual incident '{}' already open",
                self.name
            );
        }
    }
}

/// Records the verdict and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnly;

#[async_trait]
impl UnhealthyHandler for LogOnly {
    async fn on_unhealthy(&self, check_id: &str, verdict: &HealthVerdict) {
        rcvr_warn!(
            context = LogContext::new().with_check(check_id),
            details = %verdict.details,
            "health check unhealthy"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcvr_catalog::{FnExecutor, RecoveryProcedure, RecoveryResult};
    use rcvr_common::OrchestratorConfig;
    use rcvr_orchestrator::{Disposition, PrerequisiteRegistry};

    fn orchestrator() -> Arc<RecoveryOrchestrator> {
        Arc::new(RecoveryOrchestrator::new(
            OrchestratorConfig::default(),
            PrerequisiteRegistry::new(),
        ))
    }

    #[tokio::test]
    async fn trigger_handler_runs_procedure_with_check_context() {
        let orch = orchestrator();
        let executor = FnExecutor::new(|context: RecoveryContext| async move {
            let check = context["check"].as_str().unwrap_or_default().to_string();
            Ok(RecoveryResult::success(format!("recovered after {check}")))
        });
        orch.register_procedure(RecoveryProcedure::new("website_recovery", "Website", Arc::new(executor)))
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = TriggerProcedure::new(orch.clone(), "website_recovery").with_reports(tx);
        handler
            .on_unhealthy("website", &HealthVerdict::from_error("503"))
            .await;

        let report = rx.recv().await.unwrap();
        assert_eq!(report.disposition, Disposition::Completed);
        assert_eq!(report.message(), "recovered after website");
        assert_eq!(orch.history()[0].context["source"], json!("health_check"));
    }

    #[tokio::test]
    async fn manual_handler_opens_one_incident_per_name() {
        let orch = orchestrator();
        let handler = RaiseManualIncident::new(orch.clone(), "Data Corruption Detected", Severity::Critical);
        let verdict = HealthVerdict::from_error("3 corrupt files");
        handler.on_unhealthy("filesystem", &verdict).await;
        handler.on_unhealthy("filesystem", &verdict).await;

        let active = orch.active_incidents();
        assert_eq!(active.len(), 1);
        assert!(!active[0].auto_recovery);
        assert_eq!(active[0].severity, Severity::Critical);
    }
}
