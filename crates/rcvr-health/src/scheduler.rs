//! ---
//! rcvr_section: "04-health"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Periodic scheduling of registered health checks."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Each started check owns one task. The task sleeps for the check's
//! interval, runs the probe and the unhealthy handler to completion, then
//! arms the next sleep, so a check never has two probes in flight.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use rcvr_logging::{rcvr_debug, rcvr_info, rcvr_warn, LogContext};
use rcvr_metrics::RecoveryMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::check::{CheckStats, HealthCheck, HealthVerdict};
use crate::HealthError;

type StatsTable = Arc<Mutex<HashMap<String, CheckStats>>>;

/// Per-check task state.
struct CheckSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Registry of health checks and the tasks that run them.
pub struct HealthScheduler {
    checks: Mutex<IndexMap<String, HealthCheck>>,
    slots: Mutex<HashMap<String, CheckSlot>>,
    stats: StatsTable,
    metrics: Option<RecoveryMetrics>,
}

impl HealthScheduler {
    pub fn new() -> Self {
        Self {
            checks: Mutex::new(IndexMap::new()),
            slots: Mutex::new(HashMap::new()),
            stats: Arc::new(Mutex::new(HashMap::new())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RecoveryMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add a check. Ids must be unique and intervals non-zero.
    pub fn register(&self, check: HealthCheck) -> Result<(), HealthError> {
        if check.id.trim().is_empty() {
            return Err(HealthError::Invalid {
                id: check.id,
                reason: "id cannot be empty".into(),
            });
        }
        if check.interval.is_zero() || check.timeout.is_zero() {
            return Err(HealthError::Invalid {
                id: check.id,
                reason: "interval and timeout must be non-zero".into(),
            });
        }
        let mut checks = self.checks.lock();
        if checks.contains_key(&check.id) {
            return Err(HealthError::Duplicate(check.id));
        }
        rcvr_debug!(context = LogContext::new().with_check(&check.id), "health check registered");
        checks.insert(check.id.clone(), check);
        Ok(())
    }

    /// Start a task for every registered check that is not already running.
    pub fn start(&self) {
        let ids: Vec<String> = self.checks.lock().keys().cloned().collect();
        for id in ids {
            if let Err(err) = self.start_check(&id) {
                rcvr_warn!(context = LogContext::new().with_check(&id), error = %err, "health check not started");
            }
        }
    }

    /// Start a single check. Starting a running check is a no-op.
    pub fn start_check(&self, id: &str) -> Result<(), HealthError> {
        let check = self
            .checks
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| HealthError::NotFound(id.to_string()))?;

        let mut slots = self.slots.lock();
        if slots.contains_key(id) {
            return Ok(());
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();
        let metrics = self.metrics.clone();
        let interval = check.interval;
        let handle = tokio::spawn(async move {
            run_check_loop(check, stats, metrics, shutdown_rx).await;
        });
        slots.insert(id.to_string(), CheckSlot { handle, shutdown_tx });
        rcvr_info!(
            context = LogContext::new().with_check(id),
            interval_secs = interval.as_secs_f64(),
            "health check started"
        );
        Ok(())
    }

    /// Stop one check's task. The current probe, if any, is allowed to finish.
    pub async fn stop(&self, id: &str) -> bool {
        let slot = self.slots.lock().remove(id);
        match slot {
            Some(slot) => {
                shutdown_slot(id, slot).await;
                rcvr_info!(context = LogContext::new().with_check(id), "health check stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every running check.
    pub async fn stop_all(&self) {
        let slots: Vec<(String, CheckSlot)> = self.slots.lock().drain().collect();
        for (id, slot) in slots {
            shutdown_slot(&id, slot).await;
        }
        rcvr_info!("all health checks stopped");
    }

    /// Ids of checks with a running task.
    pub fn active_checks(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.slots.lock().contains_key(id)
    }

    /// Ids of every registered check, in registration order.
    pub fn registered_checks(&self) -> Vec<String> {
        self.checks.lock().keys().cloned().collect()
    }

    /// Run one probe (and the handler, when unhealthy) outside the schedule.
    pub async fn run_once(&self, id: &str) -> Result<HealthVerdict, HealthError> {
        let check = self
            .checks
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| HealthError::NotFound(id.to_string()))?;
        Ok(execute_check(&check, &self.stats, self.metrics.as_ref()).await)
    }

    pub fn check_stats(&self) -> HashMap<String, CheckStats> {
        self.stats.lock().clone()
    }
}

impl Default for HealthScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HealthScheduler {
    fn drop(&mut self) {
        for (_, slot) in self.slots.get_mut().drain() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
        }
    }
}

async fn shutdown_slot(id: &str, slot: CheckSlot) {
    let _ = slot.shutdown_tx.send(true);
    if let Err(err) = slot.handle.await {
        if !err.is_cancelled() {
            rcvr_warn!(context = LogContext::new().with_check(id), error = %err, "health check task failed");
        }
    }
}

async fn run_check_loop(
    check: HealthCheck,
    stats: StatsTable,
    metrics: Option<RecoveryMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    rcvr_debug!(context = LogContext::new().with_check(&check.id), "health loop starting");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(check.interval) => {}
            _ = shutdown.changed() => break,
        }
        execute_check(&check, &stats, metrics.as_ref()).await;
        if *shutdown.borrow() {
            break;
        }
    }
    rcvr_debug!(context = LogContext::new().with_check(&check.id), "health loop shutting down");
}

/// Run the check's probe once under its timeout. Probe errors, panics and
/// timeouts come back as unhealthy verdicts. No stats, no handler.
pub async fn probe_once(check: &HealthCheck) -> HealthVerdict {
    let probe = AssertUnwindSafe(check.probe.probe()).catch_unwind();
    match tokio::time::timeout(check.timeout, probe).await {
        Ok(Ok(Ok(verdict))) => verdict,
        Ok(Ok(Err(err))) => HealthVerdict::from_error(format!("{err:#}")),
        Ok(Err(_)) => HealthVerdict::from_error("probe panicked"),
        Err(_) => HealthVerdict::from_error(format!("probe timed out after {:?}", check.timeout)),
    }
}

/// [`probe_once`], then record stats and run the handler on an unhealthy
/// verdict.
async fn execute_check(
    check: &HealthCheck,
    stats: &Mutex<HashMap<String, CheckStats>>,
    metrics: Option<&RecoveryMetrics>,
) -> HealthVerdict {
    let verdict = probe_once(check).await;

    stats.lock().entry(check.id.clone()).or_default().record(&verdict);
    if let Some(metrics) = metrics {
        metrics.record_probe(&check.id, verdict.healthy);
    }

    if !verdict.healthy {
        rcvr_warn!(
            context = LogContext::new().with_check(&check.id),
            details = %verdict.details,
            "health check reported unhealthy"
        );
        check.on_unhealthy.on_unhealthy(&check.id, &verdict).await;
    }
    verdict
}
