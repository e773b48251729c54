//! Membership watcher: keeps the endpoint set and routing table in step
//! with cluster membership.
//!
//! Two stages. `MembershipWatcher::join` seeds the gossip layer and either
//! fails (fatal to the daemon) or yields an `EventLoop`, which then applies
//! join/leave events until shutdown.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapter::{NetworkProxy, ProxyAdapter};
use crate::endpoints::EndpointSet;
use crate::error::{MembershipError, ProxyError};
use crate::routing::RoutingTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Join,
    Leave,
}

/// A single change reported by the gossip layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    pub kind: EventKind,
    pub name: String,
    pub addr: IpAddr,
}

impl MembershipEvent {
    pub fn join(name: impl Into<String>, addr: IpAddr) -> Self {
        Self {
            kind: EventKind::Join,
            name: name.into(),
            addr,
        }
    }

    pub fn leave(name: impl Into<String>, addr: IpAddr) -> Self {
        Self {
            kind: EventKind::Leave,
            name: name.into(),
            addr,
        }
    }
}

/// The gossip layer, as far as the watcher is concerned.
pub trait Membership: Send + Sync {
    /// Contact the seeds. Returns how many seed addresses answered; zero is
    /// an error.
    fn join(
        &self,
        seeds: Vec<String>,
    ) -> impl Future<Output = Result<usize, MembershipError>> + Send;
}

/// Watcher before it has joined the cluster.
pub struct MembershipWatcher {
    endpoints: EndpointSet,
    routes: RoutingTable,
    /// Port every peer serves its front door on.
    listen_port: u16,
    peer_path: String,
    timeout: Option<Duration>,
}

impl MembershipWatcher {
    pub fn new(
        endpoints: EndpointSet,
        routes: RoutingTable,
        listen_port: u16,
        peer_path: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            endpoints,
            routes,
            listen_port,
            peer_path: peer_path.into(),
            timeout,
        }
    }

    /// Join using the endpoint set as seeds.
    pub async fn join<M: Membership>(self, membership: &M) -> Result<EventLoop, MembershipError> {
        let seeds = self.endpoints.to_vec();
        tracing::info!(seeds = ?seeds, "joining cluster");
        let answered = membership.join(seeds).await?;
        tracing::info!(answered, "joined cluster");
        Ok(EventLoop { watcher: self })
    }
}

/// Watcher in the watching state.
pub struct EventLoop {
    watcher: MembershipWatcher,
}

impl EventLoop {
    /// Apply events until `shutdown` fires or the event source closes.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<MembershipEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), MembershipError> {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("membership watcher stopping");
                    return Ok(());
                }
                event = events.recv() => event,
            };

            let Some(event) = event else {
                tracing::error!("membership event source closed");
                return Err(MembershipError::EventSourceClosed);
            };

            if let Err(e) = self.apply(&event) {
                tracing::warn!(peer = %event.name, addr = %event.addr, error = %e, "failed to apply membership event");
            }
        }
    }

    /// Apply one event to the endpoint set and routing table.
    pub fn apply(&self, event: &MembershipEvent) -> Result<(), ProxyError> {
        let w = &self.watcher;
        let addr = event.addr.to_string();
        match event.kind {
            EventKind::Join => {
                tracing::info!(peer = %event.name, addr = %addr, "node join");
                let adapter = self.peer_adapter(event.addr)?;
                w.endpoints.add(addr.clone());
                if let Some(stale) = w.routes.install(event.name.clone(), addr.clone(), adapter) {
                    if stale.address != addr {
                        tracing::debug!(peer = %event.name, old = %stale.address, "peer rejoined at new address");
                        w.endpoints.remove(&stale.address);
                    }
                }
            }
            EventKind::Leave => {
                tracing::info!(peer = %event.name, addr = %addr, "node leave");
                w.endpoints.remove(&addr);
                w.routes.remove(&event.name);
            }
        }
        Ok(())
    }

    fn peer_adapter(&self, addr: IpAddr) -> Result<ProxyAdapter, ProxyError> {
        let w = &self.watcher;
        let target = format!(
            "http://{}{}",
            SocketAddr::new(addr, w.listen_port),
            w.peer_path
        );
        Ok(ProxyAdapter::Network(NetworkProxy::new(&target, w.timeout)?))
    }
}
