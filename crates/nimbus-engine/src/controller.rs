use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nimbus_common::{ClaimPhase, FailureReason, GpuClaim};
use nimbus_store::{ClaimStore, NodeStore};

use crate::agent::AgentApi;
use crate::config::EngineConfig;
use crate::metrics::SharedMetrics;
use crate::scheduler::{ScheduleError, Scheduler};

/// The reconciliation core: level-triggered, fixed-cadence sweeps that drive
/// every open claim one step toward its desired state.
///
/// The controller is the only writer of claim status. Sweeps never overlap:
/// a single task awaits each sweep before taking the next tick, and missed
/// ticks are skipped.
pub struct Controller {
    cfg: EngineConfig,
    claims: Arc<dyn ClaimStore>,
    nodes: Arc<dyn NodeStore>,
    scheduler: Scheduler,
    agent: Arc<dyn AgentApi>,
    metrics: Arc<SharedMetrics>,
}

impl Controller {
    pub fn new(
        cfg: EngineConfig,
        claims: Arc<dyn ClaimStore>,
        nodes: Arc<dyn NodeStore>,
        agent: Arc<dyn AgentApi>,
        metrics: Arc<SharedMetrics>,
    ) -> Self {
        let scheduler = Scheduler::new(nodes.clone());
        Self { cfg, claims, nodes, scheduler, agent, metrics }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.cfg.reconcile_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.cfg.reconcile_interval.as_secs(), "controller loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("controller loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// One reconciliation sweep. A failure for one claim never aborts the
    /// sweep; every other claim still gets a chance to progress.
    pub async fn sweep(&self) {
        self.metrics.sweep_total.fetch_add(1, Ordering::Relaxed);

        let open = match self
            .claims
            .list_by_phase(&[ClaimPhase::Pending, ClaimPhase::Scheduled])
            .await
        {
            Ok(claims) => claims,
            Err(e) => {
                self.metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error=%e, "failed to list open claims, skipping sweep");
                return;
            }
        };

        for claim in open {
            self.reconcile(claim).await;
        }
    }

    async fn reconcile(&self, claim: GpuClaim) {
        debug!(claim=%claim.id, phase=%claim.phase(), "reconciling claim");
        match claim.phase() {
            ClaimPhase::Pending => self.reconcile_pending(claim).await,
            ClaimPhase::Scheduled => self.reconcile_scheduled(claim).await,
            phase => debug!(claim=%claim.id, %phase, "nothing to do"),
        }
    }

    /// Pending: find a node. "No suitable node" leaves the claim Pending,
    /// implicitly retried every sweep with no backoff and no retry limit.
    async fn reconcile_pending(&self, mut claim: GpuClaim) {
        let node = match self.scheduler.schedule(&claim).await {
            Ok(node) => node,
            Err(ScheduleError::NoSuitableNode) => {
                debug!(claim=%claim.id, gpu_count = claim.spec.resources.gpu_count, "no suitable node, claim stays pending");
                return;
            }
            Err(ScheduleError::Store(e)) => {
                warn!(claim=%claim.id, error=%e, "scheduling failed, will retry next sweep");
                return;
            }
        };

        if let Err(e) = claim.assign_node(&node.id) {
            warn!(claim=%claim.id, error=%e, "refusing invalid transition");
            return;
        }

        info!(claim=%claim.id, node=%node.id, "claim scheduled");
        self.metrics.claims_scheduled_total.fetch_add(1, Ordering::Relaxed);
        self.persist(&claim).await;
    }

    /// Scheduled: provision a container on the recorded node. A vanished
    /// node or a failed creation is terminal; a store error is not.
    async fn reconcile_scheduled(&self, mut claim: GpuClaim) {
        let Some(node_id) = claim.status.node_id.clone() else {
            // Scheduled without a node would mean a corrupted record.
            warn!(claim=%claim.id, "scheduled claim has no node recorded, skipping");
            return;
        };

        let node = match self.nodes.get_node(&node_id).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                warn!(claim=%claim.id, node=%node_id, "scheduled node no longer exists");
                self.fail(&mut claim, FailureReason::NodeNotFound).await;
                return;
            }
            Err(e) => {
                // Store hiccup, not proof the node is gone. Retry next sweep.
                warn!(claim=%claim.id, node=%node_id, error=%e, "failed to resolve node, will retry next sweep");
                return;
            }
        };

        match self.agent.create_container(&node, &claim.spec).await {
            Ok(container_id) => {
                if let Err(e) = claim.mark_running(&container_id) {
                    warn!(claim=%claim.id, error=%e, "refusing invalid transition");
                    return;
                }
                info!(claim=%claim.id, node=%node.id, container=%container_id, "container created, claim running");
                self.metrics.claims_running_total.fetch_add(1, Ordering::Relaxed);
                self.persist(&claim).await;
            }
            Err(e) => {
                warn!(claim=%claim.id, node=%node.id, error=%e, "container creation failed");
                self.fail(&mut claim, FailureReason::ContainerCreationError).await;
            }
        }
    }

    async fn fail(&self, claim: &mut GpuClaim, reason: FailureReason) {
        if let Err(e) = claim.fail(reason) {
            warn!(claim=%claim.id, error=%e, "refusing invalid transition");
            return;
        }
        info!(claim=%claim.id, %reason, "claim failed");
        self.metrics.claims_failed_total.fetch_add(1, Ordering::Relaxed);
        self.persist(claim).await;
    }

    async fn persist(&self, claim: &GpuClaim) {
        if let Err(e) = self.claims.update_claim(claim).await {
            warn!(claim=%claim.id, error=%e, "failed to persist claim status");
        }
    }
}
