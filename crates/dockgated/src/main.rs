//! dockgated: cluster-wide front door to the Docker Engine API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dockgate_core::config::DockgateConfig;
use dockgate_services::{EndpointSet, MembershipWatcher, ProxyAdapter, RoutingTable};

mod gossip;

use gossip::{Gossip, GossipConfig};

/// How long finished-early tasks get to wind down after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DockgateConfig::load().context("failed to load config")?;
    config.validate().context("invalid config")?;

    let listen = config.listen_addr()?;
    let timeout = config.request_timeout();

    // Local docker adapter. Without it there is nothing to serve.
    let local = ProxyAdapter::from_endpoint(&config.docker.endpoint, timeout)
        .with_context(|| format!("unusable docker endpoint {}", config.docker.endpoint))?;
    tracing::info!(
        endpoint = %config.docker.endpoint,
        socket = local.is_socket(),
        "local docker endpoint ready"
    );

    let name = if config.cluster.node_name.is_empty() {
        gossip::hostname().context("failed to read host name")?
    } else {
        config.cluster.node_name.clone()
    };
    tracing::info!(node = %name, listen = %listen, "dockgated starting");

    // Shared state
    let endpoints = EndpointSet::from_seeds(config.cluster.seeds.iter().cloned());
    let routes = RoutingTable::new();

    // ── Shutdown ─────────────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    // ── Gossip ───────────────────────────────────────────────────────────────
    let gossip_config = GossipConfig::from_cluster(&config.cluster, name, config.advertise_ip()?)?;
    let (gossip, events) = Gossip::bind(gossip_config).await?;

    let mut gossip_task = tokio::spawn(gossip.clone().run(shutdown.clone()));

    let watcher = MembershipWatcher::new(
        endpoints.clone(),
        routes.clone(),
        listen.port(),
        config.cluster.peer_path.clone(),
        timeout,
    );
    let event_loop = watcher
        .join(&gossip)
        .await
        .context("failed to join cluster")?;

    let mut watcher_task = tokio::spawn(event_loop.run(events, shutdown.clone()));

    // ── Front door ───────────────────────────────────────────────────────────
    let state = dockgate_api::ApiState {
        endpoints,
        routes,
        local: Arc::new(local),
        assets: config.server.assets.clone(),
    };
    let mut server_task = tokio::spawn(dockgate_api::serve(state, listen, shutdown.clone()));

    // ── Wait for exit ────────────────────────────────────────────────────────
    tokio::select! {
        _ = shutdown.cancelled()  => tracing::info!("shutting down"),
        r = &mut gossip_task      => tracing::error!("gossip exited: {:?}", r),
        r = &mut watcher_task     => tracing::error!("membership watcher exited: {:?}", r),
        r = &mut server_task      => tracing::error!("front door exited: {:?}", r),
    }
    shutdown.cancel();

    drain("gossip", gossip_task).await;
    drain("membership watcher", watcher_task).await;
    drain("front door", server_task).await;

    Ok(())
}

/// Wait for a task that has not finished yet, bounded by `DRAIN_TIMEOUT`.
async fn drain<E: std::fmt::Display>(label: &str, task: JoinHandle<Result<(), E>>) {
    if task.is_finished() {
        return;
    }
    match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!(task = label, error = %e, "task failed during shutdown"),
        Ok(Err(e)) => tracing::warn!(task = label, error = %e, "task panicked"),
        Err(_) => tracing::warn!(task = label, "task did not stop in time"),
    }
}
