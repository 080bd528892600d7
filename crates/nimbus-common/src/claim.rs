use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a claim in its lifecycle state machine.
///
/// Forward-only: Pending -> Scheduled -> Running, with Failed reachable from
/// any non-terminal phase. Completed is reserved for a future lifecycle
/// extension; nothing in the engine produces it today.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClaimPhase {
    Pending,
    Scheduled,
    Running,
    Failed,
    Completed,
}

impl ClaimPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClaimPhase::Failed | ClaimPhase::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimPhase::Pending => "Pending",
            ClaimPhase::Scheduled => "Scheduled",
            ClaimPhase::Running => "Running",
            ClaimPhase::Failed => "Failed",
            ClaimPhase::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ClaimPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable cause recorded when a claim enters Failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureReason {
    NodeNotFound,
    ContainerCreationError,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::NodeNotFound => "NodeNotFound",
            FailureReason::ContainerCreationError => "ContainerCreationError",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("claim is terminal in phase {0}")]
    Terminal(ClaimPhase),
    #[error("invalid transition {from} -> {to}")]
    Invalid { from: ClaimPhase, to: ClaimPhase },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub gpu_count: u32,
}

/// Desired state of a claim. Write-once by the admission boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSpec {
    pub image: String,
    pub resources: ResourceRequest,
}

/// Observed state of a claim. Mutated only by the controller, and only
/// through the transition methods on [`GpuClaim`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    pub phase: ClaimPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl Default for ClaimStatus {
    fn default() -> Self {
        Self {
            phase: ClaimPhase::Pending,
            node_id: None,
            container_id: None,
            access_url: None,
            reason: None,
        }
    }
}

/// A declarative request for GPU capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GpuClaim {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub spec: ClaimSpec,
    #[serde(default)]
    pub status: ClaimStatus,
}

impl GpuClaim {
    /// A freshly admitted claim: unique ID, phase Pending, empty status.
    pub fn new(user_id: impl Into<String>, spec: ClaimSpec) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            spec,
            status: ClaimStatus::default(),
        }
    }

    pub fn phase(&self) -> ClaimPhase {
        self.status.phase
    }

    /// Pending -> Scheduled, recording the chosen node.
    pub fn assign_node(&mut self, node_id: impl Into<String>) -> Result<(), TransitionError> {
        match self.status.phase {
            ClaimPhase::Pending => {
                self.status.phase = ClaimPhase::Scheduled;
                self.status.node_id = Some(node_id.into());
                Ok(())
            }
            p => Err(Self::reject(p, ClaimPhase::Scheduled)),
        }
    }

    /// Scheduled -> Running, recording the container created on the node.
    pub fn mark_running(&mut self, container_id: impl Into<String>) -> Result<(), TransitionError> {
        match self.status.phase {
            ClaimPhase::Scheduled => {
                self.status.phase = ClaimPhase::Running;
                self.status.container_id = Some(container_id.into());
                Ok(())
            }
            p => Err(Self::reject(p, ClaimPhase::Running)),
        }
    }

    /// Any non-terminal phase -> Failed. Terminal: no transition leaves Failed.
    pub fn fail(&mut self, reason: FailureReason) -> Result<(), TransitionError> {
        let p = self.status.phase;
        if p.is_terminal() {
            return Err(TransitionError::Terminal(p));
        }
        self.status.phase = ClaimPhase::Failed;
        self.status.reason = Some(reason);
        Ok(())
    }

    fn reject(from: ClaimPhase, to: ClaimPhase) -> TransitionError {
        if from.is_terminal() {
            TransitionError::Terminal(from)
        } else {
            TransitionError::Invalid { from, to }
        }
    }
}
