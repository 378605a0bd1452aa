//! ---
//! rcvr_section: "04-health"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Health check registry and scheduler."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Named periodic probes. Each registered check runs on its own task and
//! hands unhealthy verdicts to a check-specific handler.

pub mod builder;
pub mod check;
pub mod handlers;
pub mod probes;
pub mod scheduler;

use thiserror::Error;

pub use builder::check_from_config;
pub use check::{CheckStats, HealthCheck, HealthProbe, HealthVerdict, UnhealthyHandler};
pub use handlers::{LogOnly, RaiseManualIncident, TriggerProcedure};
pub use probes::{CredentialProbeCheck, FnProbe, HttpProbe, PathProbe};
pub use scheduler::{probe_once, HealthScheduler};

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("health check '{0}' is already registered")]
    Duplicate(String),
    #[error("unknown health check: {0}")]
    NotFound(String),
    #[error("invalid health check '{id}': {reason}")]
    Invalid { id: String, reason: String },
    #[error("health check '{check}' triggers unknown procedure '{procedure}'")]
    UnknownProcedure { check: String, procedure: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
