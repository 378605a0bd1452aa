//! ---
//! rcvr_section: "04-health"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Health check definitions, verdicts and per-check statistics."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub healthy: bool,
    #[serde(default)]
    pub details: Value,
}

impl HealthVerdict {
    pub fn healthy(details: Value) -> Self {
        Self {
            healthy: true,
            details,
        }
    }

    pub fn unhealthy(details: Value) -> Self {
        Self {
            healthy: false,
            details,
        }
    }

    /// Unhealthy verdict carrying `{"error": message}`.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self::unhealthy(json!({ "error": message.into() }))
    }
}

/// Determines whether part of the system is healthy.
///
/// `Err` is treated as an unhealthy verdict by the scheduler.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<HealthVerdict>;
}

/// Side effect run after an unhealthy verdict.
#[async_trait]
pub trait UnhealthyHandler: Send + Sync {
    async fn on_unhealthy(&self, check_id: &str, verdict: &HealthVerdict);
}

/// A named periodic probe and its unhealthy reaction.
#[derive(Clone)]
pub struct HealthCheck {
    pub id: String,
    pub interval: Duration,
    /// Upper bound on a single probe; expiry counts as unhealthy.
    pub timeout: Duration,
    pub probe: Arc<dyn HealthProbe>,
    pub on_unhealthy: Arc<dyn UnhealthyHandler>,
}

impl HealthCheck {
    pub fn new(
        id: impl Into<String>,
        interval: Duration,
        probe: Arc<dyn HealthProbe>,
        on_unhealthy: Arc<dyn UnhealthyHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            interval,
            timeout: Duration::from_secs(10),
            probe,
            on_unhealthy,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for HealthCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheck")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Running counters for one check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckStats {
    pub runs: u64,
    pub consecutive_failures: u32,
    pub last_verdict: Option<HealthVerdict>,
    pub last_run: Option<DateTime<Utc>>,
}

impl CheckStats {
    pub(crate) fn record(&mut self, verdict: &HealthVerdict) {
        self.runs += 1;
        if verdict.healthy {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.last_verdict = Some(verdict.clone());
        self.last_run = Some(Utc::now());
    }
}
