//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Recovery procedure definitions."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use rcvr_common::Severity;
use serde::Serialize;

use crate::executor::RecoveryExecutor;

/// A named remediation workflow and the executor that carries it out.
#[derive(Clone, Serialize)]
pub struct RecoveryProcedure {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    #[serde(with = "duration_secs")]
    pub estimated_duration: Duration,
    /// Whether health checks may run this procedure without operator approval.
    pub auto_execute: bool,
    /// Capability tokens that must all evaluate true before execution.
    pub prerequisites: IndexSet<String>,
    /// Human-readable steps, kept for audit only.
    pub steps: Vec<String>,
    #[serde(skip)]
    pub executor: Arc<dyn RecoveryExecutor>,
}

impl RecoveryProcedure {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        executor: Arc<dyn RecoveryExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            severity: Severity::default(),
            estimated_duration: Duration::from_secs(60),
            auto_execute: true,
            prerequisites: IndexSet::new(),
            steps: Vec::new(),
            executor,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_estimated_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = duration;
        self
    }

    pub fn with_auto_execute(mut self, auto_execute: bool) -> Self {
        self.auto_execute = auto_execute;
        self
    }

    /// Add a prerequisite token; duplicates collapse while keeping first-seen order.
    pub fn with_prerequisite(mut self, token: impl Into<String>) -> Self {
        self.prerequisites.insert(token.into());
        self
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for RecoveryProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryProcedure")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("auto_execute", &self.auto_execute)
            .field("prerequisites", &self.prerequisites)
            .finish_non_exhaustive()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}
