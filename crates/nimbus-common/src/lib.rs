pub mod claim;
pub mod node;

pub use claim::{ClaimPhase, ClaimSpec, ClaimStatus, FailureReason, GpuClaim, ResourceRequest, TransitionError};
pub use node::{GpuInfo, Node, NodeStatus};
