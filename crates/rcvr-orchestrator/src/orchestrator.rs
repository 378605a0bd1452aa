//! ---
//! rcvr_section: "02-orchestration"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Recovery orchestrator state machine."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use rcvr_catalog::{
    CatalogError, ProcedureCatalog, RecoveryContext, RecoveryProcedure, RecoveryResult,
};
use rcvr_common::{AppConfig, EnvCredentialStore, OrchestratorConfig, Severity};
use rcvr_ledger::{Incident, IncidentLedger, IncidentStatus, LedgerError, RecoveryState};
use rcvr_logging::{log_recovery_event, rcvr_info, rcvr_warn, LogContext, RecoveryEventOutcome};
use rcvr_metrics::RecoveryMetrics;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::guard::InFlightGuard;
use crate::prerequisites::PrerequisiteRegistry;
use crate::report::{Disposition, PrerequisiteReport, StatusReport, TriggerReport};

const ABANDONED_MESSAGE: &str = "abandoned: previous run of this procedure did not finish";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("no open incident with id {0}")]
    IncidentNotFound(String),
    #[error("incident {incident} belongs to procedure {procedure}, which is still running")]
    IncidentInFlight { incident: String, procedure: String },
    #[error("executor timed out after {0:?}")]
    Timeout(Duration),
    #[error("executor panicked: {0}")]
    Panicked(String),
    #[error("executor error: {0:#}")]
    Executor(anyhow::Error),
}

/// Owns the procedure catalog, recovery state, in-flight set and ledger.
/// Shared as `Arc<RecoveryOrchestrator>`.
#[derive(Debug)]
pub struct RecoveryOrchestrator {
    catalog: ProcedureCatalog,
    prerequisites: PrerequisiteRegistry,
    state: Mutex<RecoveryState>,
    in_flight: Mutex<HashSet<String>>,
    ledger: Option<IncidentLedger>,
    save_lock: Mutex<()>,
    config: OrchestratorConfig,
    metrics: Option<RecoveryMetrics>,
}

impl RecoveryOrchestrator {
    /// In-memory orchestrator with no ledger.
    pub fn new(config: OrchestratorConfig, prerequisites: PrerequisiteRegistry) -> Self {
        Self {
            catalog: ProcedureCatalog::new(),
            prerequisites,
            state: Mutex::new(RecoveryState::default()),
            in_flight: Mutex::new(HashSet::new()),
            ledger: None,
            save_lock: Mutex::new(()),
            config,
            metrics: None,
        }
    }

    /// Restore state from `ledger` and persist every later mutation to it.
    /// The in-flight set always starts empty.
    pub fn load(
        ledger: IncidentLedger,
        config: OrchestratorConfig,
        prerequisites: PrerequisiteRegistry,
    ) -> Self {
        let state = ledger.load();
        rcvr_info!(
            active = state.active_incidents.len(),
            history = state.recovery_history.len(),
            path = %ledger.path().display(),
            "recovery state restored"
        );
        Self {
            state: Mutex::new(state),
            ledger: Some(ledger),
            ..Self::new(config, prerequisites)
        }
    }

    /// Build from application configuration: credential store, prerequisites
    /// and ledger path all come from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let store = Arc::new(EnvCredentialStore::new(config.credentials.clone()));
        let prerequisites = PrerequisiteRegistry::from_config(&config.prerequisites, store);
        Self::load(
            IncidentLedger::new(config.ledger.path.clone()),
            config.orchestrator.clone(),
            prerequisites,
        )
    }

    pub fn with_metrics(mut self, metrics: RecoveryMetrics) -> Self {
        metrics.set_active_incidents(self.state.lock().active_incidents.len());
        self.metrics = Some(metrics);
        self
    }

    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.catalog
    }

    pub fn prerequisites(&self) -> &PrerequisiteRegistry {
        &self.prerequisites
    }

    pub fn register_procedure(&self, procedure: RecoveryProcedure) -> Result<(), OrchestratorError> {
        self.catalog.register(procedure)?;
        Ok(())
    }

    /// Run a procedure. Always resolves to a report; failures of every kind are
    /// captured in the report and the recorded incident.
    pub async fn trigger(&self, procedure_id: &str, context: RecoveryContext) -> TriggerReport {
        let log_ctx = LogContext::new().with_procedure(procedure_id);

        let procedure = match self.catalog.get(procedure_id) {
            Ok(procedure) => procedure,
            Err(err) => {
                log_recovery_event(&log_ctx, "recovery.trigger", &err.to_string(), RecoveryEventOutcome::Rejected);
                return self.finish_rejected(procedure_id, Disposition::UnknownProcedure, err.to_string());
            }
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, procedure_id) else {
            log_recovery_event(
                &log_ctx,
                "recovery.trigger",
                "recovery already in progress",
                RecoveryEventOutcome::Rejected,
            );
            return self.finish_rejected(
                procedure_id,
                Disposition::DuplicateInFlight,
                "recovery already in progress",
            );
        };

        let started = Instant::now();
        let incident_id = self.open_incident(&procedure, context.clone());
        let log_ctx = log_ctx.with_incident(&incident_id);
        log_recovery_event(
            &log_ctx,
            "recovery.started",
            &format!("starting {}", procedure.name),
            RecoveryEventOutcome::Started,
        );

        let missing = self.prerequisites.missing(&procedure.prerequisites);
        let (status, result, disposition) = if !missing.is_empty() {
            let result = RecoveryResult::failure(format!(
                "prerequisites not met: {}",
                missing.join(", ")
            ))
            .with_details(json!({ "missing": missing }));
            (
                IncidentStatus::Failed,
                result,
                Disposition::PrerequisiteUnmet { missing },
            )
        } else {
            match self.invoke(&procedure, &context).await {
                Ok(result) if result.success => (IncidentStatus::Completed, result, Disposition::Completed),
                Ok(result) => (IncidentStatus::Failed, result, Disposition::ExecutorFailure),
                Err(err) => {
                    let message = err.to_string();
                    let result =
                        RecoveryResult::failure(message.clone()).with_details(json!({ "error": message }));
                    (IncidentStatus::Error, result, Disposition::ExecutorError)
                }
            }
        };

        let outcome = match status {
            IncidentStatus::Completed => RecoveryEventOutcome::Succeeded,
            IncidentStatus::Error => RecoveryEventOutcome::Errored,
            _ => RecoveryEventOutcome::Failed,
        };
        log_recovery_event(&log_ctx, "recovery.finished", &result.message, outcome);

        self.close_incident(&incident_id, status, result.clone(), Some(&result.observations));
        if let Some(metrics) = &self.metrics {
            metrics.record_trigger(procedure_id, disposition.as_str());
            metrics.observe_recovery(procedure_id, started.elapsed());
        }

        TriggerReport {
            incident_id: Some(incident_id),
            result,
            disposition,
        }
    }

    async fn invoke(
        &self,
        procedure: &RecoveryProcedure,
        context: &RecoveryContext,
    ) -> Result<RecoveryResult, OrchestratorError> {
        let execution = AssertUnwindSafe(procedure.executor.execute(context)).catch_unwind();
        match tokio::time::timeout(self.config.executor_timeout, execution).await {
            Err(_) => Err(OrchestratorError::Timeout(self.config.executor_timeout)),
            Ok(Err(panic)) => Err(OrchestratorError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(Err(err))) => Err(OrchestratorError::Executor(err)),
            Ok(Ok(Ok(result))) => Ok(result),
        }
    }

    fn finish_rejected(
        &self,
        procedure_id: &str,
        disposition: Disposition,
        message: impl Into<String>,
    ) -> TriggerReport {
        if let Some(metrics) = &self.metrics {
            metrics.record_trigger(procedure_id, disposition.as_str());
        }
        TriggerReport::rejected(disposition, message)
    }

    /// Push a running incident for `procedure`, first closing any running
    /// incident left behind by an earlier run that never finished (a previous
    /// process, or a dropped `trigger` future).
    fn open_incident(&self, procedure: &RecoveryProcedure, context: RecoveryContext) -> String {
        let incident = Incident::for_procedure(
            procedure.id.clone(),
            procedure.name.clone(),
            procedure.severity,
            context,
        );
        let incident_id = incident.id.clone();
        {
            let mut state = self.state.lock();
            let stale: Vec<String> = state
                .running_for(&procedure.id)
                .map(|incident| incident.id.clone())
                .collect();
            for id in stale {
                rcvr_warn!(
                    context = LogContext::new().with_procedure(&procedure.id).with_incident(&id),
                    "closing abandoned incident"
                );
                let result = RecoveryResult::failure(ABANDONED_MESSAGE);
                if let Err(err) = state.close(&id, IncidentStatus::Error, result, Utc::now()) {
                    rcvr_warn!(error = %err, "failed to close abandoned incident");
                }
            }
            state.open(incident);
        }
        self.persist();
        incident_id
    }

    fn close_incident(
        &self,
        incident_id: &str,
        status: IncidentStatus,
        result: RecoveryResult,
        observations: Option<&Map<String, Value>>,
    ) -> Option<Incident> {
        let closed = {
            let mut state = self.state.lock();
            let closed = match state.close(incident_id, status, result, Utc::now()) {
                Ok(incident) => Some(incident.clone()),
                Err(err) => {
                    rcvr_warn!(
                        context = LogContext::new().with_incident(incident_id),
                        error = %err,
                        "incident could not be closed"
                    );
                    None
                }
            };
            if let Some(observations) = observations {
                state.merge_observations(observations);
            }
            closed
        };
        self.persist();
        closed
    }

    /// Best-effort write of the current state. Saves are serialized and each
    /// one snapshots the state inside the save lock.
    fn persist(&self) {
        let _save = self.save_lock.lock();
        let snapshot = self.state.lock().clone();
        if let Some(metrics) = &self.metrics {
            metrics.set_active_incidents(snapshot.active_incidents.len());
        }
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(err) = ledger.save(&snapshot) {
            rcvr_warn!(
                error = %err,
                path = %ledger.path().display(),
                "failed to persist recovery state; continuing in memory"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_ledger_failure();
            }
        }
    }

    /// Open an incident that awaits operator handling.
    pub fn create_manual_incident(
        &self,
        name: impl Into<String>,
        severity: Severity,
        context: RecoveryContext,
    ) -> Incident {
        let incident = Incident::manual(name, severity, context);
        self.state.lock().open(incident.clone());
        self.log_manual(&incident);
        self.persist();
        incident
    }

    /// Like [`RecoveryOrchestrator::create_manual_incident`], but returns
    /// `None` when a manual incident with the same name is already open.
    pub fn raise_manual_incident(
        &self,
        name: &str,
        severity: Severity,
        context: RecoveryContext,
    ) -> Option<Incident> {
        let incident = {
            let mut state = self.state.lock();
            if state.open_manual(name).is_some() {
                return None;
            }
            let incident = Incident::manual(name, severity, context);
            state.open(incident.clone());
            incident
        };
        self.log_manual(&incident);
        self.persist();
        Some(incident)
    }

    fn log_manual(&self, incident: &Incident) {
        rcvr_warn!(
            context = LogContext::new().with_incident(&incident.id),
            severity = %incident.severity,
            "manual incident opened: {}",
            incident.name
        );
    }

    /// Close an open incident on an operator's behalf. Incidents whose
    /// procedure is currently executing are refused.
    pub fn resolve_incident(
        &self,
        incident_id: &str,
        success: bool,
        message: impl Into<String>,
    ) -> Result<Incident, OrchestratorError> {
        let message = message.into();
        let procedure = {
            let state = self.state.lock();
            let incident = state
                .active_incidents
                .iter()
                .find(|incident| incident.id == incident_id)
                .ok_or_else(|| OrchestratorError::IncidentNotFound(incident_id.to_string()))?;
            incident.procedure_id.clone()
        };
        if let Some(procedure) = procedure {
            if self.in_flight.lock().contains(&procedure) {
                return Err(OrchestratorError::IncidentInFlight {
                    incident: incident_id.to_string(),
                    procedure,
                });
            }
        }

        let (status, result) = if success {
            (IncidentStatus::Completed, RecoveryResult::success(message))
        } else {
            (IncidentStatus::Failed, RecoveryResult::failure(message))
        };
        let closed = {
            let mut state = self.state.lock();
            state.close(incident_id, status, result, Utc::now())?.clone()
        };
        rcvr_info!(
            context = LogContext::new().with_incident(incident_id),
            status = %closed.status,
            "incident resolved by operator"
        );
        self.persist();
        Ok(closed)
    }

    /// Evaluate a procedure's prerequisites without opening an incident or
    /// calling the executor.
    pub fn test_procedure(&self, procedure_id: &str) -> Result<PrerequisiteReport, OrchestratorError> {
        let procedure = self.catalog.get(procedure_id)?;
        let missing = self.prerequisites.missing(&procedure.prerequisites);
        Ok(PrerequisiteReport {
            procedure_id: procedure.id.clone(),
            met: missing.is_empty(),
            missing,
        })
    }

    pub fn status(&self) -> StatusReport {
        let (active_incidents, history_len, recent_success_rate) = {
            let state = self.state.lock();
            (
                state.active_incidents.len(),
                state.recovery_history.len(),
                state.recent_success_rate(self.config.recent_window),
            )
        };
        let mut in_flight: Vec<String> = self.in_flight.lock().iter().cloned().collect();
        in_flight.sort();
        StatusReport {
            active_incidents,
            history_len,
            recent_success_rate,
            recent_window: self.config.recent_window,
            catalog_size: self.catalog.len(),
            in_flight,
        }
    }

    pub fn snapshot(&self) -> RecoveryState {
        self.state.lock().clone()
    }

    pub fn active_incidents(&self) -> Vec<Incident> {
        self.state.lock().active_incidents.clone()
    }

    /// Terminal incidents, newest first.
    pub fn history(&self) -> Vec<Incident> {
        self.state.lock().recovery_history.clone()
    }

    pub fn system_health(&self) -> Map<String, Value> {
        self.state.lock().system_health.clone()
    }

    pub fn is_in_flight(&self, procedure_id: &str) -> bool {
        self.in_flight.lock().contains(procedure_id)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
