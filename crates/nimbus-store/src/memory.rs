use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_common::{ClaimPhase, GpuClaim, Node};

use crate::types::{ClaimStore, NodeStore};

/// In-memory claim store. BTreeMap keeps enumeration ordered by claim ID so
/// sweeps visit claims deterministically.
#[derive(Debug, Clone, Default)]
pub struct MemoryClaimStore {
    claims: Arc<RwLock<BTreeMap<String, GpuClaim>>>,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn create_claim(&self, claim: &GpuClaim) -> Result<()> {
        let mut claims = self.claims.write().await;
        if claims.contains_key(&claim.id) {
            bail!("claim {} already exists", claim.id);
        }
        claims.insert(claim.id.clone(), claim.clone());
        Ok(())
    }

    async fn get_claim(&self, id: &str) -> Result<Option<GpuClaim>> {
        let claims = self.claims.read().await;
        Ok(claims.get(id).cloned())
    }

    async fn list_by_phase(&self, phases: &[ClaimPhase]) -> Result<Vec<GpuClaim>> {
        let claims = self.claims.read().await;
        Ok(claims
            .values()
            .filter(|c| phases.contains(&c.status.phase))
            .cloned()
            .collect())
    }

    async fn update_claim(&self, claim: &GpuClaim) -> Result<()> {
        let mut claims = self.claims.write().await;
        if !claims.contains_key(&claim.id) {
            bail!("claim {} not found", claim.id);
        }
        claims.insert(claim.id.clone(), claim.clone());
        Ok(())
    }
}

/// In-memory node store, same shape as [`MemoryClaimStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    nodes: Arc<RwLock<BTreeMap<String, Node>>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/administrative helper: drop a node outright.
    pub async fn remove_node(&self, id: &str) -> Option<Node> {
        self.nodes.write().await.remove(id)
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn create_node(&self, node: &Node) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            bail!("node {} already exists", node.id);
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let nodes = self.nodes.read().await;
        Ok(nodes.get(id).cloned())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self.nodes.read().await;
        Ok(nodes.values().cloned().collect())
    }

    async fn update_node(&self, node: &Node) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(&node.id) {
            bail!("node {} not found", node.id);
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }
}
