//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Incident records and lifecycle transitions."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rcvr_catalog::{RecoveryContext, RecoveryResult};
use rcvr_common::Severity;
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result};

static INCIDENT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a time-derived incident id, unique within the process.
pub fn next_incident_id() -> String {
    let seq = INCIDENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("inc-{}-{}", Utc::now().timestamp_millis(), seq)
}

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    /// Recovery (or operator handling) is still underway.
    #[default]
    Running,
    /// The executor reported success.
    Completed,
    /// A structured failure: unmet prerequisites or an executor reporting `success=false`.
    Failed,
    /// The executor returned an error, panicked or timed out.
    Error,
}

impl IncidentStatus {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Running => "running",
            IncidentStatus::Completed => "completed",
            IncidentStatus::Failed => "failed",
            IncidentStatus::Error => "error",
        }
    }

    /// Whether the status is one of the three terminal states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IncidentStatus::Running)
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked recovery attempt or operator-handled condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Time-derived unique identifier.
    pub id: String,
    /// Procedure being executed; `None` for manually raised incidents.
    #[serde(default)]
    pub procedure_id: Option<String>,
    /// Human-readable incident name.
    pub name: String,
    /// Severity copied from the procedure (or chosen by the raiser).
    #[serde(default)]
    pub severity: Severity,
    /// When the incident was opened.
    pub start_time: DateTime<Utc>,
    /// When the incident reached a terminal status.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock duration between open and close.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: IncidentStatus,
    /// Context supplied by the trigger.
    #[serde(default)]
    pub context: RecoveryContext,
    /// Outcome recorded at close.
    #[serde(default)]
    pub result: Option<RecoveryResult>,
    /// `false` when the incident awaits operator handling.
    #[serde(default = "default_auto_recovery")]
    pub auto_recovery: bool,
}

fn default_auto_recovery() -> bool {
    true
}

impl Incident {
    /// Open a running incident for a catalog procedure.
    pub fn for_procedure(
        procedure_id: impl Into<String>,
        name: impl Into<String>,
        severity: Severity,
        context: RecoveryContext,
    ) -> Self {
        Self {
            id: next_incident_id(),
            procedure_id: Some(procedure_id.into()),
            name: name.into(),
            severity,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            status: IncidentStatus::Running,
            context,
            result: None,
            auto_recovery: true,
        }
    }

    /// Open a running incident that requires operator handling.
    pub fn manual(name: impl Into<String>, severity: Severity, context: RecoveryContext) -> Self {
        Self {
            procedure_id: None,
            auto_recovery: false,
            ..Self::for_procedure(String::new(), name, severity, context)
        }
    }

    /// Whether the incident is still running.
    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Running
    }

    /// Write terminal fields. Fails if the incident was already closed or if
    /// `status` is not terminal.
    pub fn close(
        &mut self,
        status: IncidentStatus,
        result: RecoveryResult,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_open() || !status.is_terminal() {
            return Err(LedgerError::AlreadyClosed(self.id.clone()));
        }
        let elapsed = now.signed_duration_since(self.start_time);
        self.end_time = Some(now);
        self.duration_ms = Some(elapsed.num_milliseconds().max(0) as u64);
        self.status = status;
        self.result = Some(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = next_incident_id();
        let b = next_incident_id();
        assert!(a.starts_with("inc-"));
        assert_ne!(a, b);
    }

    #[test]
    fn close_sets_terminal_fields_once() {
        let mut incident = Incident::for_procedure(
            "website_recovery",
            "Website Recovery",
            Severity::Medium,
            RecoveryContext::new(),
        );
        let closed_at = incident.start_time + Duration::milliseconds(1500);
        incident
            .close(IncidentStatus::Completed, RecoveryResult::success("ok"), closed_at)
            .unwrap();
        assert_eq!(incident.duration_ms, Some(1500));
        assert_eq!(incident.end_time, Some(closed_at));

        let again = incident.close(
            IncidentStatus::Failed,
            RecoveryResult::failure("late"),
            closed_at,
        );
        assert!(matches!(again, Err(LedgerError::AlreadyClosed(_))));
        assert_eq!(incident.status, IncidentStatus::Completed);
    }

    #[test]
    fn manual_incidents_have_no_procedure() {
        let incident = Incident::manual("Data Corruption Detected", Severity::Critical, RecoveryContext::new());
        assert!(incident.procedure_id.is_none());
        assert!(!incident.auto_recovery);
        assert!(incident.is_open());
    }
}
