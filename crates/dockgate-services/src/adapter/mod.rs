//! Proxy adapters: turn an inbound request into a request against a
//! local socket or a remote HTTP endpoint and relay the response.
//!
//! Which adapter serves an endpoint is decided once, from its locator
//! string, when the adapter is constructed.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Request, Response};

use crate::error::ProxyError;

pub mod network;
pub mod socket;

pub use network::NetworkProxy;
pub use socket::SocketProxy;

/// A forwarding target, chosen at construction time.
pub enum ProxyAdapter {
    /// Local administrative endpoint behind a unix-domain socket.
    Socket(SocketProxy),
    /// Any HTTP endpoint reachable over TCP, including peers.
    Network(NetworkProxy),
}

impl ProxyAdapter {
    /// Build the adapter for an endpoint locator.
    ///
    /// `http://` and `tcp://` locators are served over TCP, `unix://` and bare
    /// paths through a unix socket that must already exist.
    pub fn from_endpoint(endpoint: &str, timeout: Option<Duration>) -> Result<Self, ProxyError> {
        match split_scheme(endpoint) {
            Some((scheme, _)) if scheme == "http" => {
                Ok(ProxyAdapter::Network(NetworkProxy::new(endpoint, timeout)?))
            }
            Some((scheme, rest)) if scheme == "tcp" => Ok(ProxyAdapter::Network(
                NetworkProxy::new(&format!("http://{rest}"), timeout)?,
            )),
            Some((scheme, rest)) if scheme == "unix" => {
                Ok(ProxyAdapter::Socket(SocketProxy::open(rest, timeout)?))
            }
            Some((scheme, _)) => Err(ProxyError::UnsupportedScheme(scheme)),
            None => Ok(ProxyAdapter::Socket(SocketProxy::open(endpoint, timeout)?)),
        }
    }

    /// Forward a request. Failures come back as error responses, never panics.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        match self {
            ProxyAdapter::Socket(p) => p.handle(req).await,
            ProxyAdapter::Network(p) => p.handle(req).await,
        }
    }

    pub fn is_socket(&self) -> bool {
        matches!(self, ProxyAdapter::Socket(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ProxyAdapter::Network(_))
    }

    /// Human-readable target, for logs.
    pub fn target(&self) -> String {
        match self {
            ProxyAdapter::Socket(p) => format!("unix://{}", p.path().display()),
            ProxyAdapter::Network(p) => p.target(),
        }
    }
}

/// Split `scheme://rest`, lowercasing the scheme. None when there is no scheme.
fn split_scheme(endpoint: &str) -> Option<(String, &str)> {
    let (scheme, rest) = endpoint.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme.to_ascii_lowercase(), rest))
}

// ── Shared helpers ────────────────────────────────────────────────────────────

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("proxy-connection");
}

/// Append every value of every header in `src` onto `dst`.
pub(crate) fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.append(name.clone(), value.clone());
    }
}

/// Bound a response-head future by the configured timeout, if any.
pub(crate) async fn within<F, T>(timeout: Option<Duration>, fut: F) -> Result<T, ProxyError>
where
    F: Future<Output = Result<T, ProxyError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ProxyError::Timeout(limit))?,
        None => fut.await,
    }
}
