pub mod agent;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod health;
pub mod metrics;
pub mod scheduler;

pub use agent::{AgentApi, AgentError, HttpAgentClient, NodeMetrics};
pub use config::EngineConfig;
pub use controller::Controller;
pub use discovery::Discovery;
pub use health::HealthChecker;
pub use metrics::SharedMetrics;
pub use scheduler::{ScheduleError, Scheduler};

#[cfg(test)]
pub(crate) mod testutil;
