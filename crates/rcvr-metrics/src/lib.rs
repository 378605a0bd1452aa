//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Metrics collection and export utilities."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across services.
pub type SharedRegistry = Arc<Registry>;

/// Produces the JSON payload served on `/status`.
pub type StatusProvider = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server exposing `/status` (JSON), `/metrics` (Prometheus
/// text, only when a registry is given) and any extra `routes`.
pub fn spawn_http_server(
    registry: Option<SharedRegistry>,
    status: StatusProvider,
    routes: Router,
    addr: SocketAddr,
) -> Result<MetricsServer> {
    let mut app = Router::new().route(
        "/status",
        get({
            let status = status.clone();
            move || async move { Json(status()) }
        }),
    );
    if let Some(registry) = registry {
        app = app.route("/metrics", get(move || metrics_handler(registry.clone())));
    }
    let app = app.merge(routes);

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %bound, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> Response {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Address actually bound (useful when listening on port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics published by the orchestrator and the health scheduler.
#[derive(Clone)]
pub struct RecoveryMetrics {
    registry: SharedRegistry,
    triggers_total: IntCounterVec,
    recovery_duration_seconds: HistogramVec,
    active_incidents: IntGauge,
    ledger_save_failures_total: IntCounter,
    health_probes_total: IntCounterVec,
}

impl RecoveryMetrics {
    /// Register the recovery metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let triggers_total = IntCounterVec::new(
            Opts::new(
                "rcvr_triggers_total",
                "Recovery trigger requests by procedure and disposition",
            ),
            &["procedure", "disposition"],
        )?;
        registry.register(Box::new(triggers_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.01, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let recovery_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rcvr_recovery_duration_seconds",
                "Wall-clock duration of recovery incidents from open to close",
            )
            .buckets(buckets),
            &["procedure"],
        )?;
        registry.register(Box::new(recovery_duration_seconds.clone()))?;

        let active_incidents = IntGauge::with_opts(Opts::new(
            "rcvr_active_incidents",
            "Incidents currently in the running state",
        ))?;
        registry.register(Box::new(active_incidents.clone()))?;

        let ledger_save_failures_total = IntCounter::with_opts(Opts::new(
            "rcvr_ledger_save_failures_total",
            "Incident ledger writes that failed and were skipped",
        ))?;
        registry.register(Box::new(ledger_save_failures_total.clone()))?;

        let health_probes_total = IntCounterVec::new(
            Opts::new(
                "rcvr_health_probes_total",
                "Health probe executions by check and verdict",
            ),
            &["check", "verdict"],
        )?;
        registry.register(Box::new(health_probes_total.clone()))?;

        Ok(Self {
            registry,
            triggers_total,
            recovery_duration_seconds,
            active_incidents,
            ledger_save_failures_total,
            health_probes_total,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_trigger(&self, procedure: &str, disposition: &str) {
        self.triggers_total
            .with_label_values(&[procedure, disposition])
            .inc();
    }

    pub fn observe_recovery(&self, procedure: &str, duration: Duration) {
        self.recovery_duration_seconds
            .with_label_values(&[procedure])
            .observe(duration.as_secs_f64());
    }

    pub fn set_active_incidents(&self, count: usize) {
        self.active_incidents.set(count as i64);
    }

    pub fn inc_ledger_failure(&self) {
        self.ledger_save_failures_total.inc();
    }

    pub fn record_probe(&self, check: &str, healthy: bool) {
        let verdict = if healthy { "healthy" } else { "unhealthy" };
        self.health_probes_total
            .with_label_values(&[check, verdict])
            .inc();
    }
}

impl std::fmt::Debug for RecoveryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryMetrics").finish_non_exhaustive()
    }
}

pub use prometheus;

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> f64 {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .and_then(|family| {
                family.get_metric().iter().find(|metric| {
                    labels.iter().all(|(key, value)| {
                        metric
                            .get_label()
                            .iter()
                            .any(|label| label.get_name() == *key && label.get_value() == *value)
                    })
                })
            })
            .map(|metric| metric.get_counter().get_value())
            .unwrap_or_default()
    }

    #[test]
    fn recovery_metrics_capture_activity() {
        let registry = new_registry();
        let metrics = RecoveryMetrics::new(registry.clone()).unwrap();

        metrics.record_trigger("website_recovery", "completed");
        metrics.record_trigger("website_recovery", "completed");
        metrics.record_trigger("website_recovery", "duplicate_in_flight");
        metrics.observe_recovery("website_recovery", Duration::from_millis(250));
        metrics.set_active_incidents(3);
        metrics.inc_ledger_failure();
        metrics.record_probe("website", false);

        assert_eq!(
            counter_value(
                &registry,
                "rcvr_triggers_total",
                &[("procedure", "website_recovery"), ("disposition", "completed")]
            ),
            2.0
        );
        assert_eq!(
            counter_value(
                &registry,
                "rcvr_health_probes_total",
                &[("check", "website"), ("verdict", "unhealthy")]
            ),
            1.0
        );
        assert_eq!(
            counter_value(&registry, "rcvr_ledger_save_failures_total", &[]),
            1.0
        );

        let gauge = registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == "rcvr_active_incidents")
            .map(|family| family.get_metric()[0].get_gauge().get_value());
        assert_eq!(gauge, Some(3.0));
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = new_registry();
        RecoveryMetrics::new(registry.clone()).unwrap();
        assert!(RecoveryMetrics::new(registry).is_err());
    }

    #[tokio::test]
    async fn server_serves_metrics_and_status() {
        let registry = new_registry();
        let metrics = RecoveryMetrics::new(registry.clone()).unwrap();
        metrics.record_trigger("data_recovery", "prerequisite_unmet");

        let status: StatusProvider = Arc::new(|| serde_json::json!({ "active_incidents": 0 }));
        let server =
            spawn_http_server(Some(registry), status, Router::new(), "127.0.0.1:0".parse().unwrap()).unwrap();
        let base = format!("http://{}", server.addr());

        let body = reqwest::get(format!("{base}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("rcvr_triggers_total"));

        let status: serde_json::Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["active_incidents"], 0);

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn server_without_registry_keeps_status_and_extra_routes() {
        let status: StatusProvider = Arc::new(|| serde_json::json!({ "active_incidents": 2 }));
        let routes = Router::new().route("/ping", get(|| async { "pong" }));
        let server = spawn_http_server(None, status, routes, "127.0.0.1:0".parse().unwrap()).unwrap();
        let base = format!("http://{}", server.addr());

        let metrics = reqwest::get(format!("{base}/metrics")).await.unwrap();
        assert_eq!(metrics.status(), reqwest::StatusCode::NOT_FOUND);

        let pong = reqwest::get(format!("{base}/ping")).await.unwrap().text().await.unwrap();
        assert_eq!(pong, "pong");

        let status: serde_json::Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["active_incidents"], 2);
        server.shutdown().await.unwrap();
    }
}
