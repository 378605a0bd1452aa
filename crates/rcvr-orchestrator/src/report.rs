//! ---
//! rcvr_section: "02-orchestration"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Trigger outcomes and status reports."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use rcvr_catalog::RecoveryResult;
use serde::{Deserialize, Serialize};

/// Tagged outcome kind of one `trigger()` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// The executor ran and reported success.
    Completed,
    /// Another run of the same procedure is still in flight; nothing was recorded.
    DuplicateInFlight,
    /// One or more prerequisites were unmet; the executor was not called.
    PrerequisiteUnmet { missing: Vec<String> },
    /// The executor ran and reported `success=false`.
    ExecutorFailure,
    /// The executor returned an error, panicked or timed out.
    ExecutorError,
    /// No procedure is registered under the requested id.
    UnknownProcedure,
}

impl Disposition {
    /// Stable label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Completed => "completed",
            Disposition::DuplicateInFlight => "duplicate_in_flight",
            Disposition::PrerequisiteUnmet { .. } => "prerequisite_unmet",
            Disposition::ExecutorFailure => "executor_failure",
            Disposition::ExecutorError => "executor_error",
            Disposition::UnknownProcedure => "unknown_procedure",
        }
    }
}

/// What the caller of `trigger()` receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerReport {
    /// Incident opened for this call; `None` when the request was rejected
    /// before an incident existed.
    pub incident_id: Option<String>,
    pub result: RecoveryResult,
    pub disposition: Disposition,
}

impl TriggerReport {
    pub(crate) fn rejected(disposition: Disposition, message: impl Into<String>) -> Self {
        Self {
            incident_id: None,
            result: RecoveryResult::failure(message),
            disposition,
        }
    }

    pub fn success(&self) -> bool {
        self.result.success
    }

    pub fn message(&self) -> &str {
        &self.result.message
    }
}

/// Dry-run prerequisite evaluation for one procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteReport {
    pub procedure_id: String,
    pub met: bool,
    pub missing: Vec<String>,
}

/// Point-in-time summary of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub active_incidents: usize,
    pub history_len: usize,
    /// Share of completed incidents among the `recent_window` newest history
    /// entries; `None` before any incident has finished.
    pub recent_success_rate: Option<f64>,
    pub recent_window: usize,
    pub catalog_size: usize,
    /// Procedures currently executing, sorted.
    pub in_flight: Vec<String>,
}
