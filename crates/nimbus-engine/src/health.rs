use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nimbus_common::{Node, NodeStatus};
use nimbus_store::NodeStore;

use crate::agent::{AgentApi, AgentError};
use crate::config::EngineConfig;
use crate::metrics::SharedMetrics;

/// Probes every Online node for liveness and current GPU occupancy.
///
/// Health only ever demotes: "I could not actually reach it". Promotion is
/// discovery's job. Offline nodes are not probed, so a dead node is demoted
/// exactly once and then left alone until discovery sees it again.
pub struct HealthChecker {
    cfg: EngineConfig,
    store: Arc<dyn NodeStore>,
    agent: Arc<dyn AgentApi>,
    metrics: Arc<SharedMetrics>,
}

impl HealthChecker {
    pub fn new(
        cfg: EngineConfig,
        store: Arc<dyn NodeStore>,
        agent: Arc<dyn AgentApi>,
        metrics: Arc<SharedMetrics>,
    ) -> Self {
        Self { cfg, store, agent, metrics }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.cfg.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.cfg.health_interval.as_secs(), "health loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("health loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.cycle().await {
                        warn!(error=%e, "health cycle failed, retrying next interval");
                    }
                }
            }
        }
    }

    /// One probe fan-out. Probes run concurrently with no ordering between
    /// them; each is bounded by the agent client's probe timeout, so the
    /// whole cycle has a bounded lifetime.
    pub async fn cycle(&self) -> anyhow::Result<()> {
        let nodes = self.store.list_nodes().await?;
        let probes = nodes
            .into_iter()
            .filter(|n| n.status == NodeStatus::Online)
            .map(|n| self.probe(n));
        join_all(probes).await;
        Ok(())
    }

    async fn probe(&self, mut node: Node) {
        match self.agent.get_metrics(&node).await {
            Ok(metrics) => {
                node.gpus = metrics.gpus;
                node.last_seen = Utc::now();
                if let Err(e) = self.store.update_node(&node).await {
                    warn!(node_id=%node.id, error=%e, "failed to persist probe result");
                }
            }
            Err(AgentError::Unreachable(cause)) => {
                warn!(node_id=%node.id, hostname=%node.hostname, %cause, "node unreachable, marking offline");
                node.demote();
                match self.store.update_node(&node).await {
                    Ok(()) => {
                        self.metrics.nodes_demoted_total.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!(node_id=%node.id, error=%e, "failed to persist node demotion");
                    }
                }
            }
            Err(AgentError::Status(code)) => {
                // Unexpected but answered: the node is reachable, so this is
                // a transient anomaly, not proof of unreachability.
                self.metrics.probe_anomalies_total.fetch_add(1, Ordering::Relaxed);
                warn!(node_id=%node.id, status = code, "node returned non-OK status, leaving state unchanged");
            }
            Err(AgentError::Decode(cause)) => {
                self.metrics.probe_anomalies_total.fetch_add(1, Ordering::Relaxed);
                warn!(node_id=%node.id, %cause, "could not decode probe response, skipping");
            }
        }
    }
}
