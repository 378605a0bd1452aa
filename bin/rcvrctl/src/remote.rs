//! ---
//! rcvr_section: "06-operator-interfaces"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "HTTP client for the daemon's control routes."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rcvr_catalog::RecoveryContext;
use rcvr_ledger::Incident;
use rcvr_orchestrator::{recover_path, resolve_path, ResolveRequest, TriggerReport};
use reqwest::StatusCode;

/// Outcome of a resolve request served by the daemon.
#[derive(Debug)]
pub(crate) enum Resolved {
    Closed(Incident),
    NotFound(String),
    Refused(String),
}

/// Talks to a running `rcvrd`. Calls return `Ok(None)` when nothing is
/// listening, so the caller can fall back to working on the ledger directly.
pub(crate) struct DaemonClient {
    client: reqwest::Client,
    base: String,
}

impl DaemonClient {
    pub(crate) fn new(addr: SocketAddr) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .build()
            .context("failed to build daemon client")?;
        Ok(Self::with_base(client, format!("http://{addr}")))
    }

    pub(crate) fn with_base(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    pub(crate) async fn recover(
        &self,
        procedure_id: &str,
        context: &RecoveryContext,
    ) -> Result<Option<TriggerReport>> {
        let url = format!("{}{}", self.base, recover_path(procedure_id));
        let response = match self.client.post(&url).json(context).send().await {
            Ok(response) => response,
            Err(err) if err.is_connect() => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("request to {url} failed")),
        };
        let report = response
            .json::<TriggerReport>()
            .await
            .with_context(|| format!("unexpected response from {url}"))?;
        Ok(Some(report))
    }

    pub(crate) async fn resolve(
        &self,
        incident_id: &str,
        success: bool,
        message: &str,
    ) -> Result<Option<Resolved>> {
        let url = format!("{}{}", self.base, resolve_path(incident_id));
        let request = ResolveRequest {
            success,
            message: message.to_string(),
        };
        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(err) if err.is_connect() => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("request to {url} failed")),
        };
        let status = response.status();
        if status == StatusCode::OK {
            let incident = response
                .json::<Incident>()
                .await
                .with_context(|| format!("unexpected response from {url}"))?;
            return Ok(Some(Resolved::Closed(incident)));
        }
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let error = body["error"].as_str().unwrap_or_default().to_string();
        match status {
            StatusCode::NOT_FOUND => Ok(Some(Resolved::NotFound(error))),
            StatusCode::CONFLICT => Ok(Some(Resolved::Refused(error))),
            other => Err(anyhow!("daemon answered {other}: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcvr_catalog::{FnExecutor, RecoveryProcedure, RecoveryResult};
    use rcvr_common::{OrchestratorConfig, Severity};
    use rcvr_orchestrator::{control_router, Disposition, PrerequisiteRegistry, RecoveryOrchestrator};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn daemon() -> (Arc<RecoveryOrchestrator>, DaemonClient) {
        let orch = Arc::new(RecoveryOrchestrator::new(
            OrchestratorConfig::default(),
            PrerequisiteRegistry::new(),
        ));
        let executor = FnExecutor::new(|_| async { Ok(RecoveryResult::success("restored")) });
        orch.register_procedure(RecoveryProcedure::new("data_recovery", "Data", Arc::new(executor)))
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = control_router(orch.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (orch, DaemonClient::new(addr).unwrap())
    }

    #[tokio::test]
    async fn recover_and_resolve_go_to_the_daemon() {
        let (orch, client) = daemon().await;
        let report = client
            .recover("data_recovery", &RecoveryContext::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.disposition, Disposition::Completed);
        assert_eq!(orch.history().len(), 1);

        let manual = orch.create_manual_incident("Backup Missing", Severity::High, RecoveryContext::new());
        match client.resolve(&manual.id, true, "remounted").await.unwrap() {
            Some(Resolved::Closed(incident)) => assert_eq!(incident.id, manual.id),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(
            client.resolve(&manual.id, true, "again").await.unwrap(),
            Some(Resolved::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_daemon_reports_none() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = DaemonClient::new(addr).unwrap();
        assert!(client
            .recover("data_recovery", &RecoveryContext::new())
            .await
            .unwrap()
            .is_none());
        assert!(client.resolve("inc-1-0", true, "x").await.unwrap().is_none());
    }
}
