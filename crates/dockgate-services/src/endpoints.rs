//! Endpoint set: addresses of every peer we know to be in the cluster.
//!
//! Seeds the gossip join at startup and answers the `/endpoints` listing
//! afterwards. Written by the membership event loop, read by request handlers.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashSet;

/// Concurrent set of peer addresses. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct EndpointSet {
    addrs: Arc<DashSet<String>>,
}

impl EndpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from configured seed addresses. Duplicates collapse.
    pub fn from_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::new();
        for seed in seeds {
            set.add(seed);
        }
        set
    }

    /// Insert an address. Returns false if it was already present.
    pub fn add(&self, addr: impl Into<String>) -> bool {
        self.addrs.insert(addr.into())
    }

    /// Remove an address. Returns false if it was not present.
    pub fn remove(&self, addr: &str) -> bool {
        self.addrs.remove(addr).is_some()
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.addrs.contains(addr)
    }

    /// Every address in the set, in no particular order.
    pub fn to_vec(&self) -> Vec<String> {
        self.addrs.iter().map(|a| a.key().clone()).collect()
    }

    /// Addresses fit for the public peer listing: sorted, loopback excluded.
    pub fn listing(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .addrs
            .iter()
            .map(|a| a.key().clone())
            .filter(|a| !is_loopback(a))
            .collect();
        out.sort();
        out
    }
}

fn is_loopback(addr: &str) -> bool {
    addr == "127.0.0.1"
        || addr
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}
