use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nimbus_common::NodeStatus;
use nimbus_store::NodeStore;

use crate::config::EngineConfig;
use crate::metrics::SharedMetrics;

/// Naming convention for control-port mappings in the tunnel registry.
const CONTROL_PREFIX: &str = "control_";

#[derive(Debug, Clone, Deserialize)]
pub struct TunnelProxy {
    pub name: String,
    pub remote_port: u16,
}

#[derive(Debug, Deserialize)]
struct ProxyListResponse {
    proxies: Vec<TunnelProxy>,
}

/// Extract the node ID from a control mapping name (`control_<nodeID>`).
/// Returns `None` for mappings that are not control ports.
pub fn parse_node_id(name: &str) -> Option<&str> {
    match name.strip_prefix(CONTROL_PREFIX) {
        Some(id) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// The registry answers in one of two shapes depending on version:
/// `{"proxies": [...]}` or a bare array. Accept both.
pub fn decode_proxies(body: &[u8]) -> anyhow::Result<Vec<TunnelProxy>> {
    if let Ok(resp) = serde_json::from_slice::<ProxyListResponse>(body) {
        return Ok(resp.proxies);
    }
    serde_json::from_slice::<Vec<TunnelProxy>>(body)
        .map_err(|e| anyhow::anyhow!("unrecognized registry response: {e}"))
}

/// Learns control-endpoint reachability from the tunnel registry.
///
/// Discovery only ever promotes: "the tunnel says this node is reachable".
/// Demotion is the health checker's job.
pub struct Discovery {
    cfg: EngineConfig,
    store: Arc<dyn NodeStore>,
    http: reqwest::Client,
    metrics: Arc<SharedMetrics>,
}

impl Discovery {
    pub fn new(cfg: EngineConfig, store: Arc<dyn NodeStore>, metrics: Arc<SharedMetrics>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(cfg.probe_timeout)
            .build()
            .unwrap_or_default();
        Self { cfg, store, http, metrics }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.cfg.discovery_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.cfg.discovery_interval.as_secs(), "discovery loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("discovery loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.metrics.discovery_cycles_total.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = self.cycle().await {
                        self.metrics.discovery_errors_total.fetch_add(1, Ordering::Relaxed);
                        warn!(error=%e, "discovery cycle failed, retrying next interval");
                    }
                }
            }
        }
    }

    async fn cycle(&self) -> anyhow::Result<()> {
        let proxies = self.fetch_proxies().await?;
        self.apply_proxies(proxies).await;
        Ok(())
    }

    async fn fetch_proxies(&self) -> anyhow::Result<Vec<TunnelProxy>> {
        let url = format!("{}/api/proxy/tcp", self.cfg.registry_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.cfg.registry_user, Some(&self.cfg.registry_pass))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("registry returned status {}", resp.status());
        }

        let body = resp.bytes().await?;
        decode_proxies(&body)
    }

    /// Apply one registry snapshot. Per-entry problems are logged and skipped;
    /// nothing here aborts the cycle.
    pub async fn apply_proxies(&self, proxies: Vec<TunnelProxy>) {
        for proxy in proxies {
            let Some(node_id) = parse_node_id(&proxy.name) else {
                debug!(name=%proxy.name, "ignoring non-control mapping");
                continue;
            };
            // Port 0 means "no known endpoint"; promoting with it would
            // leave an Online node with nothing reachable behind it.
            if proxy.remote_port == 0 {
                warn!(name=%proxy.name, "control mapping carries no port, skipping");
                continue;
            }
            self.apply_mapping(node_id, proxy.remote_port).await;
        }
    }

    async fn apply_mapping(&self, node_id: &str, remote_port: u16) {
        let mut node = match self.store.get_node(node_id).await {
            Ok(Some(n)) => n,
            Ok(None) => {
                warn!(node_id, "registry names a node the directory does not know, skipping");
                return;
            }
            Err(e) => {
                warn!(node_id, error=%e, "failed to load node, skipping");
                return;
            }
        };

        if node.control_port == remote_port && node.status == NodeStatus::Online {
            // Already current, skip the store write.
            return;
        }

        node.promote(remote_port);
        match self.store.update_node(&node).await {
            Ok(()) => {
                self.metrics.nodes_promoted_total.fetch_add(1, Ordering::Relaxed);
                info!(node_id, control_port = remote_port, "node online");
            }
            Err(e) => {
                warn!(node_id, error=%e, "failed to persist node promotion");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::CountingNodeStore;
    use nimbus_common::Node;
    use nimbus_store::MemoryNodeStore;

    #[test]
    fn parses_control_mapping_names() {
        assert_eq!(parse_node_id("control_node-a"), Some("node-a"));
        assert_eq!(parse_node_id("control_7f3b"), Some("7f3b"));
        assert_eq!(parse_node_id("control_"), None);
        assert_eq!(parse_node_id("ssh_node-a"), None);
        assert_eq!(parse_node_id("node-a_control"), None);
    }

    #[test]
    fn decodes_both_registry_shapes() {
        let object = br#"{"proxies":[{"name":"control_n1","remote_port":30001}]}"#;
        let array = br#"[{"name":"control_n1","remote_port":30001}]"#;
        for body in [object.as_slice(), array.as_slice()] {
            let proxies = decode_proxies(body).unwrap();
            assert_eq!(proxies.len(), 1);
            assert_eq!(proxies[0].name, "control_n1");
            assert_eq!(proxies[0].remote_port, 30001);
        }
        assert!(decode_proxies(b"not json").is_err());
    }

    fn discovery_with(store: Arc<dyn NodeStore>) -> Discovery {
        Discovery::new(EngineConfig::default(), store, Arc::new(SharedMetrics::default()))
    }

    #[tokio::test]
    async fn promotes_a_registering_node() {
        let inner = Arc::new(MemoryNodeStore::new());
        inner.create_node(&Node::registering("n1", "host-1")).await.unwrap();
        let store = Arc::new(CountingNodeStore::new(inner.clone()));

        let d = discovery_with(store.clone());
        d.apply_proxies(vec![TunnelProxy {
            name: "control_n1".to_string(),
            remote_port: 30001,
        }])
        .await;

        let node = inner.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.control_port, 30001);
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn unchanged_mapping_writes_nothing() {
        let inner = Arc::new(MemoryNodeStore::new());
        let mut node = Node::registering("n1", "host-1");
        node.promote(30001);
        inner.create_node(&node).await.unwrap();
        let store = Arc::new(CountingNodeStore::new(inner));

        let d = discovery_with(store.clone());
        d.apply_proxies(vec![TunnelProxy {
            name: "control_n1".to_string(),
            remote_port: 30001,
        }])
        .await;

        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn port_change_rewrites_the_node() {
        let inner = Arc::new(MemoryNodeStore::new());
        let mut node = Node::registering("n1", "host-1");
        node.promote(30001);
        inner.create_node(&node).await.unwrap();
        let store = Arc::new(CountingNodeStore::new(inner.clone()));

        let d = discovery_with(store.clone());
        d.apply_proxies(vec![TunnelProxy {
            name: "control_n1".to_string(),
            remote_port: 30002,
        }])
        .await;

        assert_eq!(store.updates(), 1);
        let node = inner.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.control_port, 30002);
    }

    #[tokio::test]
    async fn zero_port_mapping_never_promotes() {
        let inner = Arc::new(MemoryNodeStore::new());
        inner.create_node(&Node::registering("n1", "host-1")).await.unwrap();
        let store = Arc::new(CountingNodeStore::new(inner.clone()));

        let d = discovery_with(store.clone());
        d.apply_proxies(vec![TunnelProxy {
            name: "control_n1".to_string(),
            remote_port: 0,
        }])
        .await;

        assert_eq!(store.updates(), 0);
        let node = inner.get_node("n1").await.unwrap().unwrap();
        assert_eq!(node.status, NodeStatus::Registering);
        assert_eq!(node.control_port, 0);
    }

    #[tokio::test]
    async fn unknown_node_is_skipped() {
        let store = Arc::new(CountingNodeStore::new(Arc::new(MemoryNodeStore::new())));
        let d = discovery_with(store.clone());
        d.apply_proxies(vec![TunnelProxy {
            name: "control_ghost".to_string(),
            remote_port: 30001,
        }])
        .await;
        assert_eq!(store.updates(), 0);
    }
}
