use std::path::PathBuf;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Response, StatusCode};

/// Failures building or driving a proxy adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid endpoint url {endpoint}: {reason}")]
    InvalidUrl { endpoint: String, reason: String },
    #[error("unsupported endpoint scheme {0}")]
    UnsupportedScheme(String),
    #[error("unix socket {0} does not exist")]
    SocketMissing(PathBuf),
    #[error("failed to stat unix socket {0}: {1}")]
    SocketUnreadable(PathBuf, std::io::Error),
    #[error("connect to {0} failed: {1}")]
    Connect(PathBuf, std::io::Error),
    #[error("http exchange failed: {0}")]
    Exchange(#[from] hyper::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("could not build upstream request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("no response head within {0:?}")]
    Timeout(Duration),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The response a caller receives when forwarding fails.
    pub fn into_response(self) -> Response<Body> {
        let mut resp = Response::new(Body::from(self.to_string()));
        *resp.status_mut() = self.status();
        resp
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("failed to join cluster: none of {0} seeds answered")]
    JoinFailed(usize),
    #[error("gossip transport: {0}")]
    Transport(String),
    #[error("membership event source closed")]
    EventSourceClosed,
}
