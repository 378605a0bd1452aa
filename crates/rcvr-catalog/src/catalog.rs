//! ---
//! rcvr_section: "01-core-functionality"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Registry of recovery procedures keyed by id."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::procedure::RecoveryProcedure;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("recovery procedures require a non-empty id")]
    MissingId,
    #[error("unknown recovery procedure: {0}")]
    NotFound(String),
}

/// Registry of procedures. Registration normally happens at startup; lookups
/// are read-mostly afterwards.
#[derive(Debug, Default)]
pub struct ProcedureCatalog {
    procedures: RwLock<IndexMap<String, Arc<RecoveryProcedure>>>,
}

impl ProcedureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a procedure. Re-registering an id replaces it in place.
    pub fn register(&self, procedure: RecoveryProcedure) -> Result<(), CatalogError> {
        if procedure.id.trim().is_empty() {
            return Err(CatalogError::MissingId);
        }
        let id = procedure.id.clone();
        let replaced = self
            .procedures
            .write()
            .insert(id.clone(), Arc::new(procedure))
            .is_some();
        if replaced {
            info!(procedure = %id, "recovery procedure replaced");
        } else {
            debug!(procedure = %id, "recovery procedure registered");
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Arc<RecoveryProcedure>, CatalogError> {
        self.procedures
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Snapshot of every procedure in registration order.
    pub fn list(&self) -> Vec<Arc<RecoveryProcedure>> {
        self.procedures.read().values().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.procedures.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.procedures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FnExecutor;
    use crate::result::RecoveryResult;
    use rcvr_common::Severity;

    fn procedure(id: &str, name: &str) -> RecoveryProcedure {
        let executor = Arc::new(FnExecutor::new(|_| async { Ok(RecoveryResult::success("ok")) }));
        RecoveryProcedure::new(id, name, executor)
    }

    #[test]
    fn register_and_lookup() {
        let catalog = ProcedureCatalog::new();
        catalog
            .register(procedure("website_recovery", "Website Recovery").with_severity(Severity::Medium))
            .unwrap();
        let found = catalog.get("website_recovery").unwrap();
        assert_eq!(found.name, "Website Recovery");
        assert!(catalog.contains("website_recovery"));
        assert_eq!(
            catalog.get("missing").unwrap_err(),
            CatalogError::NotFound("missing".into())
        );
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let catalog = ProcedureCatalog::new();
        catalog.register(procedure("a", "first")).unwrap();
        catalog.register(procedure("b", "second")).unwrap();
        catalog.register(procedure("a", "replacement")).unwrap();

        let listed: Vec<_> = catalog.list().iter().map(|p| p.name.clone()).collect();
        assert_eq!(listed, vec!["replacement", "second"]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn empty_id_is_rejected() {
        let catalog = ProcedureCatalog::new();
        assert_eq!(
            catalog.register(procedure("  ", "blank")).unwrap_err(),
            CatalogError::MissingId
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn list_is_a_restartable_snapshot() {
        let catalog = ProcedureCatalog::new();
        catalog.register(procedure("a", "first")).unwrap();
        let snapshot = catalog.list();
        catalog.register(procedure("b", "second")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(catalog.list().len(), 2);
    }

    #[test]
    fn prerequisites_keep_order_without_duplicates() {
        let data = procedure("data_recovery", "Data Recovery")
            .with_prerequisite("backup_access")
            .with_prerequisite("restore_target")
            .with_prerequisite("backup_access");
        let tokens: Vec<_> = data.prerequisites.iter().cloned().collect();
        assert_eq!(tokens, vec!["backup_access", "restore_target"]);
    }
}
