mod args;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nimbus_engine::metrics::{healthz_handler, metrics_handler};
use nimbus_engine::{AgentApi, Controller, Discovery, HealthChecker, HttpAgentClient, SharedMetrics};
use nimbus_store::{ClaimStore, MemoryClaimStore, MemoryNodeStore, NodeStore};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cfg = args.engine_config();
    info!(registry=%cfg.registry_url, "nimbusd starting...");

    let claim_store: Arc<dyn ClaimStore> = Arc::new(MemoryClaimStore::new());
    let node_store: Arc<dyn NodeStore> = Arc::new(MemoryNodeStore::new());
    let agent: Arc<dyn AgentApi> = Arc::new(HttpAgentClient::new(&cfg));
    let metrics = Arc::new(SharedMetrics::default());

    let discovery = Discovery::new(cfg.clone(), node_store.clone(), metrics.clone());
    let health = HealthChecker::new(cfg.clone(), node_store.clone(), agent.clone(), metrics.clone());
    let controller = Controller::new(
        cfg.clone(),
        claim_store.clone(),
        node_store.clone(),
        agent.clone(),
        metrics.clone(),
    );

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(discovery.run(shutdown.clone())));
    tasks.push(tokio::spawn(health.run(shutdown.clone())));
    tasks.push(tokio::spawn(controller.run(shutdown.clone())));

    let app = Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics.clone());
    let listener = tokio::net::TcpListener::bind(&args.metrics_addr).await?;
    info!(addr=%args.metrics_addr, "serving /healthz and /metrics");

    let server_shutdown = shutdown.clone();
    tasks.push(tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;
    }));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }
    info!("nimbusd stopped");
    Ok(())
}
