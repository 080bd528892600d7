use anyhow::Result;
use async_trait::async_trait;

use nimbus_common::{ClaimPhase, GpuClaim, Node};

/// Persistence contract for claims. Updates replace the whole object, so a
/// status mutation is all-or-nothing; the engine never needs cross-row
/// transactions.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn create_claim(&self, claim: &GpuClaim) -> Result<()>;
    async fn get_claim(&self, id: &str) -> Result<Option<GpuClaim>>;
    /// All claims whose phase is in `phases`, ordered by claim ID.
    async fn list_by_phase(&self, phases: &[ClaimPhase]) -> Result<Vec<GpuClaim>>;
    async fn update_claim(&self, claim: &GpuClaim) -> Result<()>;
}

/// Persistence contract for the fleet directory.
///
/// `get_node` returns `Ok(None)` for a node that definitely does not exist;
/// an `Err` means the store itself failed. Callers rely on the distinction:
/// absence is terminal for a scheduled claim, a store error is transient.
#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn create_node(&self, node: &Node) -> Result<()>;
    async fn get_node(&self, id: &str) -> Result<Option<Node>>;
    /// All known nodes, ordered by node ID.
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    async fn update_node(&self, node: &Node) -> Result<()>;
}
