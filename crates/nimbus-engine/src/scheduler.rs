use std::sync::Arc;

use thiserror::Error;

use nimbus_common::{GpuClaim, Node, NodeStatus};
use nimbus_store::NodeStore;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Expected, recoverable: the claim simply stays Pending until the
    /// fleet changes.
    #[error("no suitable node found")]
    NoSuitableNode,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// First-fit placement over a node snapshot. Skips anything not Online,
/// then takes the first node with enough idle GPUs. Pure: no side effects,
/// no retained state.
pub fn select_node(nodes: &[Node], required_gpus: u32) -> Option<&Node> {
    nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Online)
        .find(|n| n.idle_gpu_count() as u32 >= required_gpus)
}

/// Thin stateful wrapper that snapshots the fleet directory for the pure
/// first-fit pass. Safe to call concurrently; tolerates the directory
/// changing between calls.
pub struct Scheduler {
    nodes: Arc<dyn NodeStore>,
}

impl Scheduler {
    pub fn new(nodes: Arc<dyn NodeStore>) -> Self {
        Self { nodes }
    }

    pub async fn schedule(&self, claim: &GpuClaim) -> Result<Node, ScheduleError> {
        let mut nodes = self.nodes.list_nodes().await?;
        // Stable candidate order keeps first-fit reproducible between ties.
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        select_node(&nodes, claim.spec.resources.gpu_count)
            .cloned()
            .ok_or(ScheduleError::NoSuitableNode)
    }
}
