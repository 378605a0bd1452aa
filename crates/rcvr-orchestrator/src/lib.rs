//! ---
//! rcvr_section: "02-orchestration"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Recovery orchestrator: in-flight guard, prerequisites, execution and recording."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Turns trigger requests into recorded recovery incidents.
//!
//! [`RecoveryOrchestrator::trigger`] enforces at most one running incident per
//! procedure, gates execution on prerequisites, runs the executor under a
//! timeout and records the outcome in the incident ledger.

pub mod api;
mod guard;
pub mod orchestrator;
pub mod prerequisites;
pub mod report;

pub use api::{control_router, recover_path, resolve_path, ResolveRequest};
pub use orchestrator::{OrchestratorError, RecoveryOrchestrator};
pub use prerequisites::{
    path_available, CredentialPrerequisite, FnPrerequisite, PathPrerequisite, Prerequisite,
    PrerequisiteRegistry,
};
pub use report::{Disposition, PrerequisiteReport, StatusReport, TriggerReport};
