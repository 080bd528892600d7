use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

/// Shared counters for the engine's three loops, safe for concurrent access.
#[derive(Debug, Default)]
pub struct SharedMetrics {
    /// Controller sweeps started.
    pub sweep_total: AtomicU64,
    /// Sweeps that failed to list claims.
    pub sweep_errors: AtomicU64,
    /// Claims moved Pending -> Scheduled.
    pub claims_scheduled_total: AtomicU64,
    /// Claims moved Scheduled -> Running.
    pub claims_running_total: AtomicU64,
    /// Claims moved to Failed.
    pub claims_failed_total: AtomicU64,
    /// Discovery cycles started.
    pub discovery_cycles_total: AtomicU64,
    /// Discovery cycles that failed to query the registry.
    pub discovery_errors_total: AtomicU64,
    /// Nodes promoted to Online by discovery.
    pub nodes_promoted_total: AtomicU64,
    /// Nodes demoted to Offline by health.
    pub nodes_demoted_total: AtomicU64,
    /// Probes that returned an anomaly without demoting (bad status/body).
    pub probe_anomalies_total: AtomicU64,
}

/// GET /metrics — Prometheus text exposition format.
pub async fn metrics_handler(State(metrics): State<Arc<SharedMetrics>>) -> impl IntoResponse {
    let body = format!(
        "# HELP nimbus_sweep_total Controller sweeps started.\n\
         # TYPE nimbus_sweep_total counter\n\
         nimbus_sweep_total {}\n\
         # HELP nimbus_sweep_errors Sweeps that failed to list claims.\n\
         # TYPE nimbus_sweep_errors counter\n\
         nimbus_sweep_errors {}\n\
         # HELP nimbus_claims_scheduled_total Claims moved to Scheduled.\n\
         # TYPE nimbus_claims_scheduled_total counter\n\
         nimbus_claims_scheduled_total {}\n\
         # HELP nimbus_claims_running_total Claims moved to Running.\n\
         # TYPE nimbus_claims_running_total counter\n\
         nimbus_claims_running_total {}\n\
         # HELP nimbus_claims_failed_total Claims moved to Failed.\n\
         # TYPE nimbus_claims_failed_total counter\n\
         nimbus_claims_failed_total {}\n\
         # HELP nimbus_discovery_cycles_total Discovery cycles started.\n\
         # TYPE nimbus_discovery_cycles_total counter\n\
         nimbus_discovery_cycles_total {}\n\
         # HELP nimbus_discovery_errors_total Failed registry queries.\n\
         # TYPE nimbus_discovery_errors_total counter\n\
         nimbus_discovery_errors_total {}\n\
         # HELP nimbus_nodes_promoted_total Nodes promoted to Online.\n\
         # TYPE nimbus_nodes_promoted_total counter\n\
         nimbus_nodes_promoted_total {}\n\
         # HELP nimbus_nodes_demoted_total Nodes demoted to Offline.\n\
         # TYPE nimbus_nodes_demoted_total counter\n\
         nimbus_nodes_demoted_total {}\n\
         # HELP nimbus_probe_anomalies_total Probes with bad status or body.\n\
         # TYPE nimbus_probe_anomalies_total counter\n\
         nimbus_probe_anomalies_total {}\n",
        metrics.sweep_total.load(Ordering::Relaxed),
        metrics.sweep_errors.load(Ordering::Relaxed),
        metrics.claims_scheduled_total.load(Ordering::Relaxed),
        metrics.claims_running_total.load(Ordering::Relaxed),
        metrics.claims_failed_total.load(Ordering::Relaxed),
        metrics.discovery_cycles_total.load(Ordering::Relaxed),
        metrics.discovery_errors_total.load(Ordering::Relaxed),
        metrics.nodes_promoted_total.load(Ordering::Relaxed),
        metrics.nodes_demoted_total.load(Ordering::Relaxed),
        metrics.probe_anomalies_total.load(Ordering::Relaxed),
    );
    (axum::http::StatusCode::OK, body)
}

/// GET /healthz — simple liveness probe.
pub async fn healthz_handler() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}
