use std::time::Duration;

/// Explicit configuration handed to every component at construction.
///
/// Every network call the engine makes is bounded by a timeout shorter than
/// the tick interval of the loop that issues it, so a hung peer can never
/// stall a loop past its cadence. The health interval stays shorter than the
/// reconcile interval so the controller schedules against reasonably fresh
/// occupancy data.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the tunnel registry (queried by discovery).
    pub registry_url: String,
    pub registry_user: String,
    pub registry_pass: String,
    /// Bearer token presented to node agents.
    pub agent_token: String,

    pub discovery_interval: Duration,
    pub health_interval: Duration,
    pub reconcile_interval: Duration,

    /// Timeout for the registry query and each health probe.
    pub probe_timeout: Duration,
    /// Timeout for a container-creation call.
    pub provision_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_url: "http://127.0.0.1:7500".to_string(),
            registry_user: "admin".to_string(),
            registry_pass: String::new(),
            agent_token: String::new(),
            discovery_interval: Duration::from_secs(10),
            health_interval: Duration::from_secs(15),
            reconcile_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            provision_timeout: Duration::from_secs(10),
        }
    }
}
