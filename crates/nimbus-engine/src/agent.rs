use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use nimbus_common::{ClaimSpec, GpuInfo, Node};

use crate::config::EngineConfig;

/// Failure modes of a node-agent call. The health checker treats each
/// variant differently: only `Unreachable` is proof the node is gone.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("node unreachable: {0}")]
    Unreachable(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed agent response: {0}")]
    Decode(String),
}

/// Occupancy and system metrics reported by a node agent.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeMetrics {
    #[serde(default)]
    pub gpus: Vec<GpuInfo>,
    /// System metrics carried opaquely; the engine only relays them.
    #[serde(default)]
    pub system: serde_json::Value,
}

/// Boundary to a node's agent, reached through its tunneled control port.
/// A trait so the controller and health checker can be driven against mocks.
#[async_trait]
pub trait AgentApi: Send + Sync {
    /// Ask the node to create a workload container for the claim spec.
    /// Returns the agent-assigned container ID.
    async fn create_container(&self, node: &Node, spec: &ClaimSpec) -> Result<String, AgentError>;

    /// Probe the node for liveness and current GPU occupancy.
    async fn get_metrics(&self, node: &Node) -> Result<NodeMetrics, AgentError>;
}

#[derive(Debug, Deserialize)]
struct CreateContainerResponse {
    container_id: String,
}

/// HTTP implementation over the tunnel-exposed control ports.
pub struct HttpAgentClient {
    http: reqwest::Client,
    token: String,
    provision_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(cfg: &EngineConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(cfg.probe_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            token: cfg.agent_token.clone(),
            provision_timeout: cfg.provision_timeout,
        }
    }

    fn classify(err: reqwest::Error) -> AgentError {
        if err.is_decode() {
            AgentError::Decode(err.to_string())
        } else {
            AgentError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl AgentApi for HttpAgentClient {
    async fn create_container(&self, node: &Node, spec: &ClaimSpec) -> Result<String, AgentError> {
        // Control ports are exposed locally by the tunnel server.
        let url = format!("http://127.0.0.1:{}/containers", node.control_port);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(self.provision_timeout)
            .json(spec)
            .send()
            .await
            .map_err(Self::classify)?;

        if !resp.status().is_success() {
            return Err(AgentError::Status(resp.status().as_u16()));
        }

        let body: CreateContainerResponse = resp.json().await.map_err(Self::classify)?;
        Ok(body.container_id)
    }

    async fn get_metrics(&self, node: &Node) -> Result<NodeMetrics, AgentError> {
        let url = format!("http://127.0.0.1:{}/api/v1/metrics", node.control_port);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::classify)?;

        if !resp.status().is_success() {
            return Err(AgentError::Status(resp.status().as_u16()));
        }

        resp.json::<NodeMetrics>().await.map_err(Self::classify)
    }
}
