//! HTTP handlers: peer listings and the proxy routes.

pub mod endpoints;
pub mod proxy;

use std::path::PathBuf;
use std::sync::Arc;

use dockgate_services::{EndpointSet, ProxyAdapter, RoutingTable};

#[derive(Clone)]
pub struct ApiState {
    pub endpoints: EndpointSet,
    pub routes: RoutingTable,
    /// Adapter for this host's own administrative endpoint.
    pub local: Arc<ProxyAdapter>,
    /// Directory of static assets served for unmatched paths.
    pub assets: PathBuf,
}

// Re-export handler functions for use in router setup.
pub use endpoints::{handle_endpoints, handle_peers};
pub use proxy::{handle_local, handle_peer, handle_peer_path};
