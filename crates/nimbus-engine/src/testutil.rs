use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use nimbus_common::{ClaimPhase, ClaimSpec, GpuClaim, Node};
use nimbus_store::{ClaimStore, MemoryClaimStore, MemoryNodeStore, NodeStore};

use crate::agent::{AgentApi, AgentError, NodeMetrics};

/// Scripted agent for controller and health tests.
pub(crate) struct MockAgent {
    create_result: Mutex<Result<String, AgentError>>,
    metrics_result: Mutex<Result<NodeMetrics, AgentError>>,
    create_calls: AtomicUsize,
    metrics_calls: AtomicUsize,
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            create_result: Mutex::new(Ok("ctr-0".to_string())),
            metrics_result: Mutex::new(Ok(NodeMetrics {
                gpus: Vec::new(),
                system: serde_json::Value::Null,
            })),
            create_calls: AtomicUsize::new(0),
            metrics_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_container_id(&self, id: &str) {
        *self.create_result.lock().unwrap() = Ok(id.to_string());
    }

    pub fn fail_create(&self, err: AgentError) {
        *self.create_result.lock().unwrap() = Err(err);
    }

    pub fn set_metrics(&self, metrics: NodeMetrics) {
        *self.metrics_result.lock().unwrap() = Ok(metrics);
    }

    pub fn fail_metrics(&self, err: AgentError) {
        *self.metrics_result.lock().unwrap() = Err(err);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn metrics_calls(&self) -> usize {
        self.metrics_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentApi for MockAgent {
    async fn create_container(&self, _node: &Node, _spec: &ClaimSpec) -> Result<String, AgentError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.create_result.lock().unwrap().clone()
    }

    async fn get_metrics(&self, _node: &Node) -> Result<NodeMetrics, AgentError> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        self.metrics_result.lock().unwrap().clone()
    }
}

/// ClaimStore wrapper whose `update_claim` can be made to fail for one
/// claim ID, simulating a store write failure mid-sweep.
pub(crate) struct FailingClaimStore {
    inner: Arc<MemoryClaimStore>,
    fail_update_for: Mutex<Option<String>>,
}

impl FailingClaimStore {
    pub fn new(inner: Arc<MemoryClaimStore>) -> Self {
        Self { inner, fail_update_for: Mutex::new(None) }
    }

    pub fn fail_updates_for(&self, claim_id: &str) {
        *self.fail_update_for.lock().unwrap() = Some(claim_id.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_update_for.lock().unwrap() = None;
    }
}

#[async_trait]
impl ClaimStore for FailingClaimStore {
    async fn create_claim(&self, claim: &GpuClaim) -> Result<()> {
        self.inner.create_claim(claim).await
    }

    async fn get_claim(&self, id: &str) -> Result<Option<GpuClaim>> {
        self.inner.get_claim(id).await
    }

    async fn list_by_phase(&self, phases: &[ClaimPhase]) -> Result<Vec<GpuClaim>> {
        self.inner.list_by_phase(phases).await
    }

    async fn update_claim(&self, claim: &GpuClaim) -> Result<()> {
        if self.fail_update_for.lock().unwrap().as_deref() == Some(claim.id.as_str()) {
            bail!("store write failed for claim {}", claim.id);
        }
        self.inner.update_claim(claim).await
    }
}

/// NodeStore wrapper that counts writes, for asserting the absence of
/// an update call.
pub(crate) struct CountingNodeStore {
    inner: Arc<MemoryNodeStore>,
    updates: AtomicUsize,
}

impl CountingNodeStore {
    pub fn new(inner: Arc<MemoryNodeStore>) -> Self {
        Self { inner, updates: AtomicUsize::new(0) }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeStore for CountingNodeStore {
    async fn create_node(&self, node: &Node) -> Result<()> {
        self.inner.create_node(node).await
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        self.inner.get_node(id).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.inner.list_nodes().await
    }

    async fn update_node(&self, node: &Node) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_node(node).await
    }
}
