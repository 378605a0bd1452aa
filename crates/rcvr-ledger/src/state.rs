//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "In-memory recovery state shared by the orchestrator."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use rcvr_catalog::RecoveryResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::incident::{Incident, IncidentStatus};
use crate::{LedgerError, Result};

/// Active incidents, terminal history (most recent first) and auxiliary
/// health observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryState {
    /// Incidents with status `running`.
    #[serde(default)]
    pub active_incidents: Vec<Incident>,
    /// Terminal incidents, newest first.
    #[serde(default)]
    pub recovery_history: Vec<Incident>,
    /// Free-form key/value observations.
    #[serde(default)]
    pub system_health: Map<String, Value>,
}

impl RecoveryState {
    /// Append a running incident to the active list.
    pub fn open(&mut self, incident: Incident) {
        self.active_incidents.push(incident);
    }

    /// Close an active incident and move it to the front of the history.
    pub fn close(
        &mut self,
        incident_id: &str,
        status: IncidentStatus,
        result: RecoveryResult,
        now: DateTime<Utc>,
    ) -> Result<&Incident> {
        let index = self
            .active_incidents
            .iter()
            .position(|incident| incident.id == incident_id)
            .ok_or_else(|| LedgerError::AlreadyClosed(incident_id.to_string()))?;
        let mut incident = self.active_incidents.remove(index);
        if let Err(err) = incident.close(status, result, now) {
            self.active_incidents.insert(index, incident);
            return Err(err);
        }
        self.recovery_history.insert(0, incident);
        Ok(&self.recovery_history[0])
    }

    /// Active incidents owned by the given procedure.
    pub fn running_for<'a>(&'a self, procedure_id: &'a str) -> impl Iterator<Item = &'a Incident> + 'a {
        self.active_incidents
            .iter()
            .filter(move |incident| incident.procedure_id.as_deref() == Some(procedure_id))
    }

    /// First open manual incident with the given name.
    pub fn open_manual(&self, name: &str) -> Option<&Incident> {
        self.active_incidents
            .iter()
            .find(|incident| incident.procedure_id.is_none() && incident.name == name)
    }

    /// Look up an incident in either list.
    pub fn find(&self, incident_id: &str) -> Option<&Incident> {
        self.active_incidents
            .iter()
            .chain(self.recovery_history.iter())
            .find(|incident| incident.id == incident_id)
    }

    /// Merge executor observations into `system_health`; later values overwrite.
    pub fn merge_observations(&mut self, observations: &Map<String, Value>) {
        for (key, value) in observations {
            self.system_health.insert(key.clone(), value.clone());
        }
    }

    /// Fold in records persisted by another writer of the same ledger.
    ///
    /// Unknown incidents are adopted. A record this state holds as running is
    /// replaced when `other` has it closed; otherwise this state's copy wins,
    /// as do its `system_health` values.
    pub fn absorb(&mut self, other: RecoveryState) {
        let mut history_changed = false;
        for incident in other.active_incidents.into_iter().chain(other.recovery_history) {
            history_changed |= self.absorb_incident(incident);
        }
        for (key, value) in other.system_health {
            self.system_health.entry(key).or_insert(value);
        }
        if history_changed {
            // stable, so this state's own ordering survives ties
            self.recovery_history.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        }
    }

    /// Returns whether the history gained an entry.
    fn absorb_incident(&mut self, incident: Incident) -> bool {
        if self.recovery_history.iter().any(|own| own.id == incident.id) {
            return false;
        }
        match self.active_incidents.iter().position(|own| own.id == incident.id) {
            Some(index) if !incident.is_open() => {
                self.active_incidents.remove(index);
                self.recovery_history.push(incident);
                true
            }
            Some(_) => false,
            None if incident.is_open() => {
                self.active_incidents.push(incident);
                false
            }
            None => {
                self.recovery_history.push(incident);
                true
            }
        }
    }

    /// Fraction of the `window` most recent terminal incidents that completed.
    /// `None` when there is no history yet.
    pub fn recent_success_rate(&self, window: usize) -> Option<f64> {
        let recent: Vec<_> = self.recovery_history.iter().take(window).collect();
        if recent.is_empty() {
            return None;
        }
        let completed = recent
            .iter()
            .filter(|incident| incident.status == IncidentStatus::Completed)
            .count();
        Some(completed as f64 / recent.len() as f64)
    }
}
