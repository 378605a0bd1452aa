//! ---
//! rcvr_section: "05-procedures"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Fallback credential selection."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rcvr_catalog::{RecoveryContext, RecoveryExecutor, RecoveryResult, StepLog};
use rcvr_common::config::CredentialFailoverConfig;
use rcvr_common::{parse_endpoint, CredentialProbe};
use serde_json::json;

/// Observation key holding the credential chosen by the last failover.
pub const LAST_SELECTED_CREDENTIAL: &str = "last_selected_credential";

/// Walks the candidate credentials in order and selects the first usable one.
/// Endpoint-style values (`scheme://host:port`) must parse to be usable.
#[derive(Debug, Clone)]
pub struct CredentialFailover {
    candidates: Vec<String>,
    store: Arc<dyn CredentialProbe>,
}

impl CredentialFailover {
    pub fn new(config: &CredentialFailoverConfig, store: Arc<dyn CredentialProbe>) -> Self {
        Self {
            candidates: config.candidates.clone(),
            store,
        }
    }
}

#[async_trait]
impl RecoveryExecutor for CredentialFailover {
    async fn execute(&self, _context: &RecoveryContext) -> Result<RecoveryResult> {
        let mut log = StepLog::new();
        for key in &self.candidates {
            let Some(value) = self.store.lookup_key(key) else {
                log.fail(key.as_str(), "not configured");
                continue;
            };
            if value.contains("://") && parse_endpoint(&value).is_none() {
                log.fail(key.as_str(), "endpoint is not scheme://host:port");
                continue;
            }
            let tried = log.steps().len();
            return Ok(RecoveryResult::success(format!("selected credential {key}"))
                .with_steps(log.steps().to_vec())
                .with_details(json!({ "selected": key, "skipped": tried }))
                .with_observation(LAST_SELECTED_CREDENTIAL, key.as_str()));
        }

        Ok(RecoveryResult::failure("no usable credential among candidates")
            .with_steps(log.steps().to_vec())
            .with_details(json!({ "candidates": self.candidates })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use rcvr_common::EnvCredentialStore;

    fn failover(store: EnvCredentialStore, candidates: &[&str]) -> CredentialFailover {
        CredentialFailover::new(
            &CredentialFailoverConfig {
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            },
            Arc::new(store),
        )
    }

    #[tokio::test]
    async fn first_present_candidate_is_selected() {
        let store = EnvCredentialStore::file_only(IndexMap::new())
            .with_value("github", "fallback_token", "ghp_backup");
        let result = failover(store, &["github.token", "github.fallback_token"])
            .execute(&RecoveryContext::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.observations[LAST_SELECTED_CREDENTIAL], json!("github.fallback_token"));
        assert_eq!(result.details["skipped"], 1);
    }

    #[tokio::test]
    async fn malformed_endpoint_is_skipped() {
        let store = EnvCredentialStore::file_only(IndexMap::new())
            .with_value("proxy", "primary", "http://proxy.internal")
            .with_value("proxy", "secondary", "http://user:pw@proxy2.internal:3128");
        let result = failover(store, &["proxy.primary", "proxy.secondary"])
            .execute(&RecoveryContext::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.observations[LAST_SELECTED_CREDENTIAL], json!("proxy.secondary"));
    }

    #[tokio::test]
    async fn exhausted_candidates_fail_without_observation() {
        let store = EnvCredentialStore::file_only(IndexMap::new());
        let result = failover(store, &["github.token"])
            .execute(&RecoveryContext::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "no usable credential among candidates");
        assert!(result.observations.is_empty());
    }
}
