//! dockgate-services: shared cluster state and the proxy transports.
//!
//! The endpoint set and routing table are written by the membership event
//! loop and read by request handlers; both are cheap to clone and share.

pub mod adapter;
pub mod endpoints;
pub mod error;
pub mod membership;
pub mod routing;

pub use adapter::{NetworkProxy, ProxyAdapter, SocketProxy};
pub use endpoints::EndpointSet;
pub use error::{MembershipError, ProxyError};
pub use membership::{EventKind, EventLoop, Membership, MembershipEvent, MembershipWatcher};
pub use routing::{PeerRoute, RoutingTable};
