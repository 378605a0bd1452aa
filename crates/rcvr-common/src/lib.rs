//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Shared primitives and utilities for the recovery runtime."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Core shared primitives for the RCVR workspace.
//! This crate exposes configuration loading, credential lookup, severity
//! levels and tracing setup consumed across the workspace.

pub mod config;
pub mod credentials;
pub mod logging;
pub mod severity;

pub use config::{
    AppConfig, HealthCheckConfig, LedgerConfig, LoggingConfig, MetricsConfig, OrchestratorConfig,
    PrerequisiteConfig, ProbeConfig, ProceduresConfig, UnhealthyAction,
};
pub use credentials::{parse_endpoint, split_key, CredentialProbe, EnvCredentialStore, ServiceEndpoint};
pub use logging::{init_cli_tracing, init_tracing, LogFormat};
pub use severity::Severity;
