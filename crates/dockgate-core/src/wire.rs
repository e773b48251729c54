//! Gossip wire format: datagrams exchanged between dockgate nodes.
//!
//! Every datagram is a single JSON document carrying a version byte and one
//! `GossipMessage`. A receiver seeing an unknown version drops the datagram.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Default UDP port for gossip traffic.
pub const DEFAULT_GOSSIP_PORT: u16 = 7946;

/// Largest datagram we will send or accept (max UDP payload over IPv4).
pub const MAX_DATAGRAM: usize = 65_507;

/// Upper bound on the member sample piggybacked on a Ping or Ack.
pub const MAX_MEMBER_SAMPLE: usize = 64;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A node as described on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable node identifier.
    pub name: String,
    /// Address peers should reach this node's gossip socket at.
    pub addr: IpAddr,
    /// Gossip UDP port.
    pub port: u16,
}

impl Member {
    pub fn gossip_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GossipMessage {
    /// Liveness probe. The receiver answers with an Ack.
    Ping { from: Member, members: Vec<Member> },
    Ack { from: Member, members: Vec<Member> },
    /// The sender is leaving the cluster.
    Leave { from: Member },
}

#[derive(Serialize, Deserialize)]
struct Datagram {
    version: u8,
    message: GossipMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed datagram: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("datagram of {0} bytes exceeds {MAX_DATAGRAM}")]
    TooLarge(usize),
}

impl GossipMessage {
    /// The member that sent this message.
    pub fn sender(&self) -> &Member {
        match self {
            GossipMessage::Ping { from, .. }
            | GossipMessage::Ack { from, .. }
            | GossipMessage::Leave { from } => from,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let bytes = serde_json::to_vec(&Datagram {
            version: WIRE_VERSION,
            message: self.clone(),
        })?;
        if bytes.len() > MAX_DATAGRAM {
            return Err(WireError::TooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() > MAX_DATAGRAM {
            return Err(WireError::TooLarge(bytes.len()));
        }
        let datagram: Datagram = serde_json::from_slice(bytes)?;
        if datagram.version != WIRE_VERSION {
            return Err(WireError::UnsupportedVersion(datagram.version));
        }
        Ok(datagram.message)
    }
}
