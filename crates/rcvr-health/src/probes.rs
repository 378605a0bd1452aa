//! ---
//! rcvr_section: "04-health"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Built-in health probes."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use rcvr_common::CredentialProbe;
use rcvr_orchestrator::path_available;
use serde_json::json;

use crate::check::{HealthProbe, HealthVerdict};

/// GET a URL; any 2xx status is healthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> Result<HealthVerdict> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?;
        let status = response.status();
        let details = json!({ "url": self.url, "status": status.as_u16() });
        Ok(if status.is_success() {
            HealthVerdict::healthy(details)
        } else {
            HealthVerdict::unhealthy(details)
        })
    }
}

/// Healthy when a path exists and, optionally, is writable.
#[derive(Debug, Clone)]
pub struct PathProbe {
    path: PathBuf,
    writable: bool,
}

impl PathProbe {
    pub fn new(path: impl Into<PathBuf>, writable: bool) -> Self {
        Self {
            path: path.into(),
            writable,
        }
    }
}

#[async_trait]
impl HealthProbe for PathProbe {
    async fn probe(&self) -> Result<HealthVerdict> {
        let available = path_available(&self.path, self.writable);
        let details = json!({ "path": self.path.display().to_string(), "writable": self.writable });
        Ok(if available {
            HealthVerdict::healthy(details)
        } else {
            HealthVerdict::unhealthy(details)
        })
    }
}

/// Healthy when the named `section.option` credential is present.
#[derive(Debug, Clone)]
pub struct CredentialProbeCheck {
    key: String,
    store: Arc<dyn CredentialProbe>,
}

impl CredentialProbeCheck {
    pub fn new(key: impl Into<String>, store: Arc<dyn CredentialProbe>) -> Self {
        Self {
            key: key.into(),
            store,
        }
    }
}

#[async_trait]
impl HealthProbe for CredentialProbeCheck {
    async fn probe(&self) -> Result<HealthVerdict> {
        let details = json!({ "credential": self.key });
        Ok(if self.store.is_present(&self.key) {
            HealthVerdict::healthy(details)
        } else {
            HealthVerdict::unhealthy(details)
        })
    }
}

type ProbeFn = dyn Fn() -> BoxFuture<'static, Result<HealthVerdict>> + Send + Sync;

/// Adapts an async closure into a [`HealthProbe`].
pub struct FnProbe {
    inner: Box<ProbeFn>,
}

impl FnProbe {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HealthVerdict>> + Send + 'static,
    {
        Self {
            inner: Box::new(move || Box::pin(f())),
        }
    }
}

impl fmt::Debug for FnProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnProbe")
    }
}

#[async_trait]
impl HealthProbe for FnProbe {
    async fn probe(&self) -> Result<HealthVerdict> {
        (self.inner)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use indexmap::IndexMap;
    use rcvr_common::EnvCredentialStore;
    use tempfile::tempdir;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn http_probe_maps_status_codes() {
        let base = serve(
            Router::new()
                .route("/ok", get(|| async { "fine" }))
                .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
        )
        .await;

        let ok = HttpProbe::new(format!("{base}/ok"), Duration::from_secs(5)).unwrap();
        let verdict = ok.probe().await.unwrap();
        assert!(verdict.healthy);
        assert_eq!(verdict.details["status"], 200);

        let down = HttpProbe::new(format!("{base}/down"), Duration::from_secs(5)).unwrap();
        let verdict = down.probe().await.unwrap();
        assert!(!verdict.healthy);
        assert_eq!(verdict.details["status"], 503);
    }

    #[tokio::test]
    async fn http_probe_errors_on_refused_connection() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let probe = HttpProbe::new(format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
        assert!(probe.probe().await.is_err());
    }

    #[tokio::test]
    async fn path_and_credential_probes() {
        let dir = tempdir().unwrap();
        assert!(PathProbe::new(dir.path(), true).probe().await.unwrap().healthy);
        assert!(!PathProbe::new(dir.path().join("gone"), false).probe().await.unwrap().healthy);

        let store = Arc::new(EnvCredentialStore::file_only(IndexMap::new()).with_value("github", "token", "ghp"));
        assert!(CredentialProbeCheck::new("github.token", store.clone()).probe().await.unwrap().healthy);
        assert!(!CredentialProbeCheck::new("github.fallback_token", store).probe().await.unwrap().healthy);
    }
}
