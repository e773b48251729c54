//! dockgate-core: configuration, gossip wire format, and shared constants.
//! All other dockgate crates depend on this one.

pub mod config;
pub mod wire;

pub use config::{ConfigError, DockgateConfig};
pub use wire::{GossipMessage, Member, WireError};
