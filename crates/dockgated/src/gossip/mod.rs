//! Gossip membership: a small heartbeat protocol over UDP.
//!
//! Every node pings the members it knows (plus the seeds and any members it
//! has only heard about second-hand) on a fixed interval. Hearing from a
//! member refreshes it; a new name, or a known name at a new address, is a
//! join; silence past the peer timeout, or an explicit Leave, is a leave.
//! Changes are reported to the membership watcher over a channel.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::{DashMap, DashSet};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use dockgate_core::config::ClusterConfig;
use dockgate_core::wire::{GossipMessage, Member, MAX_MEMBER_SAMPLE};
use dockgate_services::{Membership, MembershipError, MembershipEvent};

pub mod broadcast;
pub mod listener;

pub use broadcast::hostname;

/// Re-send interval for join pings while waiting for an Ack.
const JOIN_RETRY: Duration = Duration::from_millis(250);

/// Cap on second-hand members queued for probing.
const MAX_PROBES: usize = 256;

#[derive(Debug, Clone)]
pub struct GossipConfig {
    pub name: String,
    pub bind: SocketAddr,
    /// Address announced for this node.
    pub advertise: IpAddr,
    /// Port assumed for seeds given without one.
    pub default_port: u16,
    pub interval: Duration,
    pub peer_timeout: Duration,
    pub join_timeout: Duration,
}

impl GossipConfig {
    pub fn from_cluster(
        cluster: &ClusterConfig,
        name: String,
        advertise: Option<IpAddr>,
    ) -> Result<Self> {
        let bind_ip: IpAddr = cluster
            .gossip_bind
            .parse()
            .with_context(|| format!("invalid gossip_bind {}", cluster.gossip_bind))?;
        let advertise = advertise.unwrap_or(if bind_ip.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            bind_ip
        });
        Ok(Self {
            name,
            bind: SocketAddr::new(bind_ip, cluster.gossip_port),
            advertise,
            default_port: cluster.gossip_port,
            interval: Duration::from_millis(cluster.gossip_interval_ms),
            peer_timeout: Duration::from_secs(cluster.peer_timeout_secs),
            join_timeout: Duration::from_secs(cluster.join_timeout_secs),
        })
    }
}

/// A member we have heard from directly.
#[derive(Debug, Clone)]
struct MemberState {
    /// Source address of its datagrams.
    gossip_addr: SocketAddr,
    last_seen: Instant,
}

struct Inner {
    local: Member,
    socket: UdpSocket,
    config: GossipConfig,
    members: DashMap<String, MemberState>,
    /// Members heard about second-hand, not yet heard from.
    probes: DashSet<SocketAddr>,
    seeds: DashSet<SocketAddr>,
    /// Seed addresses that answered since the last join started.
    acked: DashSet<SocketAddr>,
    ack_notify: Notify,
    /// Unbounded so the receive loop never waits on the watcher, which only
    /// starts draining once the join has finished.
    events: mpsc::UnboundedSender<MembershipEvent>,
}

/// Handle to the gossip layer. Clones share one socket and member table.
#[derive(Clone)]
pub struct Gossip {
    inner: Arc<Inner>,
}

impl Gossip {
    /// Bind the gossip socket. The local node is reported as the first join.
    pub async fn bind(
        config: GossipConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MembershipEvent>)> {
        let socket = UdpSocket::bind(config.bind)
            .await
            .with_context(|| format!("failed to bind gossip socket {}", config.bind))?;
        let port = socket.local_addr()?.port();

        let local = Member {
            name: config.name.clone(),
            addr: config.advertise,
            port,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(MembershipEvent::join(local.name.clone(), local.addr))
            .context("event channel unavailable")?;

        tracing::info!(name = %local.name, addr = %local.addr, port, "gossip socket bound");

        let gossip = Self {
            inner: Arc::new(Inner {
                local,
                socket,
                config,
                members: DashMap::new(),
                probes: DashSet::new(),
                seeds: DashSet::new(),
                acked: DashSet::new(),
                ack_notify: Notify::new(),
                events: tx,
            }),
        };
        Ok((gossip, rx))
    }

    pub fn local(&self) -> &Member {
        &self.inner.local
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.socket.local_addr()?)
    }

    /// Names of the members currently considered alive, sorted.
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.members.iter().map(|m| m.key().clone()).collect();
        names.sort();
        names
    }

    /// Run the receive, heartbeat, and expiry loops until `shutdown` fires,
    /// then tell every member we are leaving.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tokio::select! {
            _ = shutdown.cancelled() => {
                self.announce_leave().await;
                Ok(())
            }
            r = self.receive_loop() => r,
            r = self.heartbeat_loop() => r,
            r = self.expiry_loop() => r,
        }
    }

    async fn join_seeds(&self, seeds: Vec<String>) -> Result<usize, MembershipError> {
        let mut targets = Vec::new();
        for seed in &seeds {
            match resolve_seed(seed, self.inner.config.default_port).await {
                Ok(addrs) => {
                    for addr in addrs {
                        self.inner.seeds.insert(addr);
                        targets.push(addr);
                    }
                }
                Err(e) => tracing::warn!(seed = %seed, error = %e, "failed to resolve seed"),
            }
        }
        if targets.is_empty() {
            return Err(MembershipError::JoinFailed(seeds.len()));
        }

        self.inner.acked.clear();
        let deadline = tokio::time::Instant::now() + self.inner.config.join_timeout;
        loop {
            let ping = self.ping();
            for target in &targets {
                self.send(&ping, *target).await;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::select! {
                _ = self.inner.ack_notify.notified() => {}
                _ = tokio::time::sleep(JOIN_RETRY.min(remaining)) => {}
            }

            let answered = targets
                .iter()
                .filter(|t| self.inner.acked.contains(*t))
                .count();
            if answered > 0 {
                return Ok(answered);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(MembershipError::JoinFailed(seeds.len()));
            }
        }
    }

    // ── Shared helpers ────────────────────────────────────────────────────────

    fn ping(&self) -> GossipMessage {
        GossipMessage::Ping {
            from: self.inner.local.clone(),
            members: self.sample(),
        }
    }

    fn ack(&self) -> GossipMessage {
        GossipMessage::Ack {
            from: self.inner.local.clone(),
            members: self.sample(),
        }
    }

    /// Members to piggyback on a Ping or Ack.
    fn sample(&self) -> Vec<Member> {
        self.inner
            .members
            .iter()
            .take(MAX_MEMBER_SAMPLE)
            .map(|m| Member {
                name: m.key().clone(),
                addr: m.gossip_addr.ip(),
                port: m.gossip_addr.port(),
            })
            .collect()
    }

    async fn send(&self, msg: &GossipMessage, to: SocketAddr) {
        let bytes = match msg.encode() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode gossip message");
                return;
            }
        };
        match self.inner.socket.send_to(&bytes, to).await {
            Ok(n) => tracing::trace!(bytes = n, to = %to, "gossip sent"),
            Err(e) => tracing::debug!(to = %to, error = %e, "gossip send failed"),
        }
    }

    fn emit(&self, event: MembershipEvent) {
        if self.inner.events.send(event).is_err() {
            tracing::trace!("membership watcher gone, event dropped");
        }
    }

    async fn announce_leave(&self) {
        let leave = GossipMessage::Leave {
            from: self.inner.local.clone(),
        };
        let targets: Vec<SocketAddr> = self.inner.members.iter().map(|m| m.gossip_addr).collect();
        for target in targets {
            self.send(&leave, target).await;
        }
        tracing::info!("left cluster");
    }
}

impl Membership for Gossip {
    fn join(
        &self,
        seeds: Vec<String>,
    ) -> impl Future<Output = Result<usize, MembershipError>> + Send {
        let gossip = self.clone();
        async move { gossip.join_seeds(seeds).await }
    }
}

/// Resolve `host` or `host:port`, defaulting the port.
async fn resolve_seed(seed: &str, default_port: u16) -> Result<Vec<SocketAddr>> {
    if let Ok(addr) = seed.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    if let Ok(ip) = seed.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, default_port)]);
    }
    let addrs: Vec<SocketAddr> = if seed.contains(':') {
        tokio::net::lookup_host(seed).await?.collect()
    } else {
        tokio::net::lookup_host((seed, default_port)).await?.collect()
    };
    Ok(addrs)
}
