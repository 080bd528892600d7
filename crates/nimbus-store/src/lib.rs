pub mod memory;
pub mod types;

pub use memory::{MemoryClaimStore, MemoryNodeStore};
pub use types::{ClaimStore, NodeStore};
