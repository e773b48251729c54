//! Gossip heartbeat.
//!
//! Periodically pings every known member, every queued probe target, and
//! every seed, so members stay fresh and seeds are retried after a partition.

use std::collections::HashSet;
use std::net::SocketAddr;

use anyhow::Result;
use tokio::time;

use super::Gossip;

impl Gossip {
    /// Runs until cancelled.
    pub(super) async fn heartbeat_loop(&self) -> Result<()> {
        let mut interval = time::interval(self.inner.config.interval);

        tracing::info!(
            interval_ms = self.inner.config.interval.as_millis() as u64,
            "gossip heartbeat starting"
        );

        loop {
            interval.tick().await;

            let mut targets: HashSet<SocketAddr> =
                self.inner.members.iter().map(|m| m.gossip_addr).collect();
            targets.extend(self.inner.probes.iter().map(|p| *p));
            targets.extend(self.inner.seeds.iter().map(|s| *s));
            if let Ok(own) = self.inner.socket.local_addr() {
                targets.remove(&own);
            }

            let ping = self.ping();
            for target in targets {
                self.send(&ping, target).await;
            }
        }
    }
}

/// The host name, used as the default node name.
pub fn hostname() -> Result<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).into_owned();
    if name.is_empty() {
        anyhow::bail!("host name is empty");
    }
    Ok(name)
}
