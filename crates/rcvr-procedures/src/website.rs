//! ---
//! rcvr_section: "05-procedures"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Website availability recovery."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rcvr_catalog::{RecoveryContext, RecoveryExecutor, RecoveryResult, StepLog};
use rcvr_common::config::WebsiteProcedureConfig;
use serde_json::json;
use tracing::debug;

/// Probes the site, waits, and probes once more. Succeeds when either probe
/// answers with a 2xx status. A `url` string in the context overrides the
/// configured URL.
#[derive(Debug, Clone)]
pub struct WebsiteRecovery {
    client: reqwest::Client,
    url: String,
    retry_delay: Duration,
}

impl WebsiteRecovery {
    pub fn new(config: &WebsiteProcedureConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            retry_delay: config.retry_delay,
        })
    }

    async fn probe(&self, url: &str) -> Result<u16, String> {
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(err) => Err(err.to_string()),
        }
    }
}

fn is_success(status: &Result<u16, String>) -> bool {
    matches!(status, Ok(code) if (200..300).contains(code))
}

fn describe(status: &Result<u16, String>) -> String {
    match status {
        Ok(code) => format!("HTTP {code}"),
        Err(err) => err.clone(),
    }
}

#[async_trait]
impl RecoveryExecutor for WebsiteRecovery {
    async fn execute(&self, context: &RecoveryContext) -> Result<RecoveryResult> {
        let url = context
            .get("url")
            .and_then(|value| value.as_str())
            .unwrap_or(&self.url)
            .to_string();
        let mut log = StepLog::new();

        let first = self.probe(&url).await;
        if is_success(&first) {
            log.pass("probe", describe(&first));
            return Ok(log
                .finish(format!("{url} is reachable"))
                .with_details(json!({ "url": url, "attempts": 1 })));
        }
        log.pass("probe", format!("site unhealthy: {}", describe(&first)));

        debug!(%url, delay_ms = self.retry_delay.as_millis() as u64, "waiting before re-probe");
        tokio::time::sleep(self.retry_delay).await;

        let second = self.probe(&url).await;
        log.record("reprobe", is_success(&second), describe(&second));
        let details = json!({ "url": url, "attempts": 2 });
        Ok(log.finish(format!("{url} recovered")).with_details(details))
    }
}
