use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeStatus {
    Registering,
    Online,
    Offline,
}

/// One GPU on a node. `busy` is the occupancy flag the scheduler counts;
/// `container_id` names the owning workload while busy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GpuInfo {
    pub id: String,
    pub model: String,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

/// A compute host capable of running GPU workloads.
///
/// `control_port == 0` means no known reachable endpoint. Status Online
/// implies the port is currently believed reachable; demoting to Offline
/// must clear it so a stale port is never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub hostname: String,
    pub status: NodeStatus,
    #[serde(default)]
    pub gpus: Vec<GpuInfo>,
    pub control_port: u16,
    pub last_seen: DateTime<Utc>,
}

impl Node {
    /// A node as created by the registration boundary: known identity,
    /// no endpoint, no liveness observation yet.
    pub fn registering(id: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            status: NodeStatus::Registering,
            gpus: Vec::new(),
            control_port: 0,
            last_seen: Utc::now(),
        }
    }

    pub fn idle_gpu_count(&self) -> usize {
        self.gpus.iter().filter(|g| !g.busy).count()
    }

    /// Discovery observed a reachable control endpoint.
    pub fn promote(&mut self, control_port: u16) {
        self.status = NodeStatus::Online;
        self.control_port = control_port;
        self.last_seen = Utc::now();
    }

    /// Health could not reach the node. Clears the port so it cannot be
    /// reused until discovery sees the node again.
    pub fn demote(&mut self) {
        self.status = NodeStatus::Offline;
        self.control_port = 0;
        self.last_seen = Utc::now();
    }
}
