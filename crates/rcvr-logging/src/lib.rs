//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Structured logging adapters for incident lifecycle events."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

#[macro_use]
pub mod macros;

#[doc(hidden)]
pub use tracing as __tracing;

/// Initialize a baseline tracing subscriber suitable for development and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured context attached to every recovery log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogContext<'a> {
    /// Procedure identifier the event belongs to.
    pub procedure: Option<&'a str>,
    /// Incident identifier the event belongs to.
    pub incident: Option<&'a str>,
    /// Health check that raised the event.
    pub check: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a procedure identifier.
    pub fn with_procedure(mut self, procedure: &'a str) -> Self {
        self.procedure = Some(procedure);
        self
    }

    /// Attach an incident identifier.
    pub fn with_incident(mut self, incident: &'a str) -> Self {
        self.incident = Some(incident);
        self
    }

    /// Attach a health check identifier.
    pub fn with_check(mut self, check: &'a str) -> Self {
        self.check = Some(check);
        self
    }
}

/// Lifecycle stage of an incident used for standardized log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEventOutcome {
    /// An incident was opened.
    Started,
    /// The recovery finished successfully.
    Succeeded,
    /// The recovery finished with a domain failure.
    Failed,
    /// The request was rejected before an incident was opened.
    Rejected,
    /// The executor raised an unexpected error.
    Errored,
}

impl RecoveryEventOutcome {
    /// Static label emitted in the `outcome` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryEventOutcome::Started => "started",
            RecoveryEventOutcome::Succeeded => "succeeded",
            RecoveryEventOutcome::Failed => "failed",
            RecoveryEventOutcome::Rejected => "rejected",
            RecoveryEventOutcome::Errored => "errored",
        }
    }

    /// Level the event is emitted at.
    pub fn level(&self) -> Level {
        match self {
            RecoveryEventOutcome::Started | RecoveryEventOutcome::Succeeded => Level::INFO,
            RecoveryEventOutcome::Failed | RecoveryEventOutcome::Rejected => Level::WARN,
            RecoveryEventOutcome::Errored => Level::ERROR,
        }
    }
}

/// Emit a standardized incident lifecycle event.
pub fn log_recovery_event(
    context: &LogContext<'_>,
    event: &str,
    message: &str,
    outcome: RecoveryEventOutcome,
) {
    let label = outcome.as_str();
    // callsite levels are static, so dispatch on the outcome's level
    match outcome.level() {
        Level::ERROR => rcvr_error!(context = *context, event, outcome = label, "{}", message),
        Level::WARN => rcvr_warn!(context = *context, event, outcome = label, "{}", message),
        _ => rcvr_info!(context = *context, event, outcome = label, "{}", message),
    }
}
