use std::time::Duration;

use clap::Parser;

use nimbus_engine::EngineConfig;

#[derive(Debug, Parser)]
#[command(name = "nimbusd", about = "GPU claim orchestration engine")]
pub struct Args {
    /// Base URL of the tunnel registry API.
    #[arg(long, env = "NIMBUS_REGISTRY_URL", default_value = "http://127.0.0.1:7500")]
    pub registry_url: String,

    #[arg(long, env = "NIMBUS_REGISTRY_USER", default_value = "admin")]
    pub registry_user: String,

    #[arg(long, env = "NIMBUS_REGISTRY_PASS", default_value = "")]
    pub registry_pass: String,

    /// Bearer token presented to node agents.
    #[arg(long, env = "NIMBUS_AGENT_TOKEN", default_value = "")]
    pub agent_token: String,

    #[arg(long, default_value_t = 10)]
    pub discovery_interval_secs: u64,

    /// Must stay shorter than the reconcile interval.
    #[arg(long, default_value_t = 15)]
    pub health_interval_secs: u64,

    #[arg(long, default_value_t = 30)]
    pub reconcile_interval_secs: u64,

    #[arg(long, default_value_t = 5)]
    pub probe_timeout_secs: u64,

    #[arg(long, default_value_t = 10)]
    pub provision_timeout_secs: u64,

    /// Listen address for /healthz and /metrics.
    #[arg(long, env = "NIMBUS_METRICS_ADDR", default_value = "0.0.0.0:9090")]
    pub metrics_addr: String,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            registry_url: self.registry_url.clone(),
            registry_user: self.registry_user.clone(),
            registry_pass: self.registry_pass.clone(),
            agent_token: self.agent_token.clone(),
            discovery_interval: Duration::from_secs(self.discovery_interval_secs),
            health_interval: Duration::from_secs(self.health_interval_secs),
            reconcile_interval: Duration::from_secs(self.reconcile_interval_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            provision_timeout: Duration::from_secs(self.provision_timeout_secs),
        }
    }
}
