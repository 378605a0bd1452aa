//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Incident ledger and durable recovery state."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Incident records and the whole-document JSON ledger that persists them.

/// Result alias used throughout the ledger crate.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error type for the ledger subsystem.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Wrapper for IO errors encountered while reading/writing the ledger file.
    #[error("io error on {path}: {source}")]
    Io {
        /// File being accessed when the error occurred.
        path: std::path::PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reported when terminal fields are written to an incident a second time.
    #[error("incident {0} is already closed")]
    AlreadyClosed(String),
}

pub mod incident;
pub mod state;
pub mod store;

pub use incident::{next_incident_id, Incident, IncidentStatus};
pub use state::RecoveryState;
pub use store::{IncidentLedger, LEDGER_VERSION};
