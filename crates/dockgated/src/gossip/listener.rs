//! Gossip receive and expiry loops.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Result;
use dashmap::mapref::entry::Entry;

use dockgate_core::wire::{GossipMessage, Member, MAX_DATAGRAM};
use dockgate_services::MembershipEvent;

use super::{Gossip, MemberState, MAX_PROBES};

impl Gossip {
    /// Receive gossip datagrams and update the member table.
    ///
    /// Runs until the socket fails; a bad datagram is dropped, never fatal.
    pub(super) async fn receive_loop(&self) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        tracing::info!("gossip listener starting");

        loop {
            let (len, src) = match self.inner.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "recv_from failed");
                    continue;
                }
            };

            match GossipMessage::decode(&buf[..len]) {
                Ok(msg) => self.handle(msg, src).await,
                Err(e) => tracing::trace!(from = %src, error = %e, "dropping gossip datagram"),
            }
        }
    }

    async fn handle(&self, msg: GossipMessage, src: SocketAddr) {
        // Our own datagrams only matter for answering self-seeded joins.
        if msg.sender().name == self.inner.local.name {
            match msg {
                GossipMessage::Ping { .. } => self.send(&self.ack(), src).await,
                GossipMessage::Ack { .. } => self.record_ack(src),
                GossipMessage::Leave { .. } => {}
            }
            return;
        }

        match msg {
            GossipMessage::Ping { from, members } => {
                self.touch(&from, src);
                self.merge(&members);
                self.send(&self.ack(), src).await;
            }
            GossipMessage::Ack { from, members } => {
                self.touch(&from, src);
                self.merge(&members);
                self.record_ack(src);
            }
            GossipMessage::Leave { from } => {
                self.inner.probes.remove(&src);
                if let Some((name, state)) = self.inner.members.remove(&from.name) {
                    self.emit(MembershipEvent::leave(name, state.gossip_addr.ip()));
                }
            }
        }
    }

    /// Only acks from a seed count towards a join.
    fn record_ack(&self, src: SocketAddr) {
        if self.inner.seeds.contains(&src) {
            self.inner.acked.insert(src);
            self.inner.ack_notify.notify_waiters();
        }
    }

    /// Refresh a member heard from directly; report it if it is new or moved.
    fn touch(&self, from: &Member, src: SocketAddr) {
        let now = Instant::now();
        let joined = match self.inner.members.entry(from.name.clone()) {
            Entry::Occupied(mut e) => {
                let state = e.get_mut();
                let moved = state.gossip_addr.ip() != src.ip();
                state.gossip_addr = src;
                state.last_seen = now;
                moved
            }
            Entry::Vacant(e) => {
                e.insert(MemberState {
                    gossip_addr: src,
                    last_seen: now,
                });
                true
            }
        };
        self.inner.probes.remove(&src);

        if joined {
            self.emit(MembershipEvent::join(from.name.clone(), src.ip()));
        }
    }

    /// Queue members we have only heard about for probing.
    fn merge(&self, members: &[Member]) {
        for m in members {
            if m.name == self.inner.local.name || self.inner.members.contains_key(&m.name) {
                continue;
            }
            if self.inner.probes.len() >= MAX_PROBES {
                break;
            }
            self.inner.probes.insert(m.gossip_addr());
        }
    }

    /// Drop members not heard from within the peer timeout.
    ///
    /// Runs until cancelled.
    pub(super) async fn expiry_loop(&self) -> Result<()> {
        let ttl = self.inner.config.peer_timeout;
        let check_interval = (ttl / 4).clamp(Duration::from_millis(10), Duration::from_secs(1));
        let mut interval = tokio::time::interval(check_interval);

        loop {
            interval.tick().await;

            let mut expired = Vec::new();
            self.inner.members.retain(|name, state| {
                if state.last_seen.elapsed() < ttl {
                    true
                } else {
                    expired.push((name.clone(), state.gossip_addr.ip()));
                    false
                }
            });

            for (name, ip) in expired {
                tracing::debug!(peer = %name, "member timed out");
                self.emit(MembershipEvent::leave(name, ip));
            }
        }
    }
}
