//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Recovery procedure catalog."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Named remediation procedures and the contract their executors implement.

pub mod catalog;
pub mod executor;
pub mod procedure;
pub mod result;

pub use catalog::{CatalogError, ProcedureCatalog};
pub use executor::{FnExecutor, RecoveryExecutor};
pub use procedure::RecoveryProcedure;
pub use rcvr_common::Severity;
pub use result::{RecoveryContext, RecoveryResult, StepLog, StepOutcome};
