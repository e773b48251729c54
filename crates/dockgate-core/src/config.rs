//! Configuration system for dockgate.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $DOCKGATE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/dockgate/config.toml
//!   3. ~/.config/dockgate/config.toml

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::wire::DEFAULT_GOSSIP_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DockgateConfig {
    pub server: ServerConfig,
    pub docker: DockerConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port the front door listens on.
    pub listen: String,
    /// Directory of static assets served at `/`.
    pub assets: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Local administrative endpoint: a socket path, `unix://` path, or http/tcp URL.
    pub endpoint: String,
    /// Bound on obtaining a response head from any proxied target. 0 = none.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Stable node identifier announced to peers. Empty = hostname.
    pub node_name: String,
    /// Seed peers, `host` or `host:port`.
    pub seeds: Vec<String>,
    pub gossip_bind: String,
    pub gossip_port: u16,
    /// Address announced for the local node. Empty = derived from gossip_bind.
    pub advertise_addr: String,
    /// Path on a peer's front door that reaches the peer's local endpoint.
    pub peer_path: String,
    pub gossip_interval_ms: u64,
    /// A peer not heard from for this long is considered gone.
    pub peer_timeout_secs: u64,
    pub join_timeout_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9000".to_string(),
            assets: PathBuf::from("."),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            endpoint: "/var/run/docker.sock".to_string(),
            request_timeout_secs: 0,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            seeds: vec!["127.0.0.1".to_string()],
            gossip_bind: "0.0.0.0".to_string(),
            gossip_port: DEFAULT_GOSSIP_PORT,
            advertise_addr: String::new(),
            peer_path: "/localdockerapi".to_string(),
            gossip_interval_ms: 1000,
            peer_timeout_secs: 5,
            join_timeout_secs: 5,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("dockgate")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DockgateConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("DOCKGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Parse a config file, falling back to defaults when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Apply DOCKGATE_* env var overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary `DOCKGATE_*` lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DOCKGATE_SERVER__LISTEN") {
            self.server.listen = v;
        }
        if let Some(v) = lookup("DOCKGATE_SERVER__ASSETS") {
            self.server.assets = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCKGATE_DOCKER__ENDPOINT") {
            self.docker.endpoint = v;
        }
        if let Some(v) = lookup("DOCKGATE_DOCKER__REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.docker.request_timeout_secs = secs;
            }
        }
        if let Some(v) = lookup("DOCKGATE_CLUSTER__NODE_NAME") {
            self.cluster.node_name = v;
        }
        if let Some(v) = lookup("DOCKGATE_CLUSTER__SEEDS") {
            self.cluster.seeds = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = lookup("DOCKGATE_CLUSTER__GOSSIP_PORT") {
            if let Ok(p) = v.parse() {
                self.cluster.gossip_port = p;
            }
        }
        if let Some(v) = lookup("DOCKGATE_CLUSTER__ADVERTISE_ADDR") {
            self.cluster.advertise_addr = v;
        }
    }

    /// Reject values that would leave the daemon unable to serve or route.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.cluster.seeds.is_empty() {
            return Err(invalid("cluster.seeds", "at least one seed is required"));
        }
        if self.cluster.seeds.iter().any(|s| s.is_empty()) {
            return Err(invalid("cluster.seeds", "empty seed entry"));
        }
        if !self.cluster.peer_path.starts_with('/') {
            return Err(invalid("cluster.peer_path", "must start with '/'"));
        }
        if self.cluster.gossip_interval_ms == 0 {
            return Err(invalid("cluster.gossip_interval_ms", "must be non-zero"));
        }
        if self.cluster.peer_timeout_secs == 0 {
            return Err(invalid("cluster.peer_timeout_secs", "must be non-zero"));
        }
        self.advertise_ip()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen
            .parse()
            .map_err(|e| invalid("server.listen", format!("{}: {e}", self.server.listen)))
    }

    /// Port peers are expected to serve their own front door on.
    pub fn listen_port(&self) -> Result<u16, ConfigError> {
        Ok(self.listen_addr()?.port())
    }

    /// Explicit advertise address, if one is configured.
    pub fn advertise_ip(&self) -> Result<Option<IpAddr>, ConfigError> {
        if self.cluster.advertise_addr.is_empty() {
            return Ok(None);
        }
        self.cluster.advertise_addr.parse().map(Some).map_err(|e| {
            invalid(
                "cluster.advertise_addr",
                format!("{}: {e}", self.cluster.advertise_addr),
            )
        })
    }

    /// Per-request upstream timeout; zero disables it.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.docker.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
