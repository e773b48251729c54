//! Routing table: which adapter serves each named peer.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use dashmap::DashMap;

use crate::adapter::ProxyAdapter;

/// A live route to a peer's front door.
///
/// The adapter is fully constructed before the route is published, so a
/// reader holding a `PeerRoute` can always invoke it.
#[derive(Clone)]
pub struct PeerRoute {
    /// Gossip node identifier.
    pub name: String,
    /// Address the peer was last seen at.
    pub address: String,
    pub adapter: Arc<ProxyAdapter>,
}

/// Routes keyed by peer name, shared between the membership event loop
/// and request handlers.
///
/// Installing or removing a route swaps a whole `PeerRoute`; readers see the
/// old route or the new one. Lookups clone the adapter `Arc` and release the
/// shard before the request is forwarded.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: Arc<DashMap<String, PeerRoute>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a route, returning the one it replaced.
    pub fn install(
        &self,
        name: impl Into<String>,
        address: impl Into<String>,
        adapter: ProxyAdapter,
    ) -> Option<PeerRoute> {
        let name = name.into();
        let route = PeerRoute {
            name: name.clone(),
            address: address.into(),
            adapter: Arc::new(adapter),
        };
        self.routes.insert(name, route)
    }

    pub fn remove(&self, name: &str) -> Option<PeerRoute> {
        self.routes.remove(name).map(|(_, route)| route)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ProxyAdapter>> {
        self.routes.get(name).map(|r| r.adapter.clone())
    }

    pub fn route(&self, name: &str) -> Option<PeerRoute> {
        self.routes.get(name).map(|r| r.value().clone())
    }

    /// Forward `req` to the named peer, or answer 404 if it is not routed.
    pub async fn proxy(&self, name: &str, req: Request<Body>) -> Response<Body> {
        match self.lookup(name) {
            Some(adapter) => adapter.handle(req).await,
            None => {
                tracing::debug!(peer = %name, "no route for peer");
                let mut resp = Response::new(Body::from(format!("unknown peer {name}\n")));
                *resp.status_mut() = StatusCode::NOT_FOUND;
                resp
            }
        }
    }

    /// `(name, address)` of every route, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .routes
            .iter()
            .map(|r| (r.name.clone(), r.address.clone()))
            .collect();
        out.sort();
        out
    }
}
